//! Structured result reporting.
//!
//! Cases report through a [`Printer`]: nested named objects holding
//! key/value pairs. The harness decides *what* is reported (every duration,
//! every failure, every case result); the printer decides the format.

use std::io::{self, Write};

use serde_json::{Map, Value};

/// Sink for structured results.
pub trait Printer {
    /// Opens a nested object under `key`.
    fn open_object(&mut self, key: &str);
    /// Closes the innermost open object.
    fn close_object(&mut self);
    /// Emits one key/value pair in the innermost open object.
    fn key(&mut self, key: &str, value: Value);
    /// Emits a free-form informational message.
    fn info(&mut self, message: &str) {
        self.key("info", Value::from(message));
    }
}

impl<P: Printer + ?Sized> Printer for &mut P {
    fn open_object(&mut self, key: &str) {
        (**self).open_object(key);
    }

    fn close_object(&mut self) {
        (**self).close_object();
    }

    fn key(&mut self, key: &str, value: Value) {
        (**self).key(key, value);
    }

    fn info(&mut self, message: &str) {
        (**self).info(message);
    }
}

impl<P: Printer + ?Sized> Printer for Box<P> {
    fn open_object(&mut self, key: &str) {
        (**self).open_object(key);
    }

    fn close_object(&mut self) {
        (**self).close_object();
    }

    fn key(&mut self, key: &str, value: Value) {
        (**self).key(key, value);
    }

    fn info(&mut self, message: &str) {
        (**self).info(message);
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Builds one JSON document from the emitted results.
///
/// Keys keep their emission order. A key repeated inside one object gets a
/// `#<n>` suffix instead of overwriting the earlier value.
#[derive(Debug, Default)]
pub struct JsonPrinter {
    root: Map<String, Value>,
    open: Vec<(String, Map<String, Value>)>,
}

impl JsonPrinter {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> &mut Map<String, Value> {
        match self.open.last_mut() {
            Some((_, map)) => map,
            None => &mut self.root,
        }
    }

    /// Closes any objects left open and returns the document.
    pub fn finish(mut self) -> Value {
        while !self.open.is_empty() {
            self.close_object();
        }
        Value::Object(self.root)
    }

    /// Closes any objects left open and writes the document, pretty-printed.
    pub fn write_to<W: Write>(self, mut out: W) -> io::Result<()> {
        let document = self.finish();
        serde_json::to_writer_pretty(&mut out, &document)?;
        writeln!(out)
    }
}

fn insert_unique(map: &mut Map<String, Value>, key: &str, value: Value) {
    if !map.contains_key(key) {
        map.insert(key.to_owned(), value);
        return;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{key}#{n}");
        if !map.contains_key(&candidate) {
            map.insert(candidate, value);
            return;
        }
        n += 1;
    }
}

impl Printer for JsonPrinter {
    fn open_object(&mut self, key: &str) {
        self.open.push((key.to_owned(), Map::new()));
    }

    fn close_object(&mut self) {
        if let Some((key, map)) = self.open.pop() {
            insert_unique(self.current(), &key, Value::Object(map));
        }
    }

    fn key(&mut self, key: &str, value: Value) {
        insert_unique(self.current(), key, value);
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Writes indented `key: value` lines as results arrive.
pub struct TextPrinter<W: Write> {
    out: W,
    depth: usize,
}

impl<W: Write> TextPrinter<W> {
    /// Creates a printer writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out, depth: 0 }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn indent(&self) -> String {
        "  ".repeat(self.depth)
    }
}

impl<W: Write> Printer for TextPrinter<W> {
    fn open_object(&mut self, key: &str) {
        let indent = self.indent();
        let _ = writeln!(self.out, "{indent}{key}:");
        self.depth += 1;
    }

    fn close_object(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn key(&mut self, key: &str, value: Value) {
        let indent = self.indent();
        let _ = match value {
            Value::String(s) => writeln!(self.out, "{indent}{key}: {s}"),
            other => writeln!(self.out, "{indent}{key}: {other}"),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_objects_build_a_tree() {
        let mut printer = JsonPrinter::new();
        printer.open_object("posix::mq");
        printer.open_object("mq");
        printer.key("receiveTimed (ms)", json!(101));
        printer.close_object();
        printer.key("result", json!(true));
        printer.close_object();
        assert_eq!(
            printer.finish(),
            json!({"posix::mq": {"mq": {"receiveTimed (ms)": 101}, "result": true}})
        );
    }

    #[test]
    fn repeated_keys_are_kept() {
        let mut printer = JsonPrinter::new();
        printer.key("waitTimed (ms)", json!(100));
        printer.key("waitTimed (ms)", json!(102));
        printer.key("waitTimed (ms)", json!(104));
        let doc = printer.finish();
        assert_eq!(doc["waitTimed (ms)"], json!(100));
        assert_eq!(doc["waitTimed (ms)#2"], json!(102));
        assert_eq!(doc["waitTimed (ms)#3"], json!(104));
    }

    #[test]
    fn finish_closes_dangling_objects() {
        let mut printer = JsonPrinter::new();
        printer.open_object("a");
        printer.open_object("b");
        printer.info("left open");
        assert_eq!(printer.finish(), json!({"a": {"b": {"info": "left open"}}}));
    }

    #[test]
    fn text_printer_indents_objects() {
        let mut printer = TextPrinter::new(Vec::new());
        printer.open_object("posix::sched");
        printer.key("result", json!(false));
        printer.key("info", json!("not tested"));
        printer.close_object();
        let text = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(text, "posix::sched:\n  result: false\n  info: not tested\n");
    }
}
