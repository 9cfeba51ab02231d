//! POSIX message queues.

use std::sync::Arc;
use std::time::Duration;

use posix_harness::{Case, CaseResult, Check, Gate, Printer, Suite, TimingWindow};

use crate::os::mq::{MessageQueue, MqInfo};
use crate::os::{Errno, SysResult};

const NAME: &str = "/posixtest-mq0";
const MISSING: &str = "/posixtest-mq1";
const CAPACITY: i64 = 4;
const MESSAGE_SIZE: i64 = 32;
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const BUFFER_SIZE: usize = MESSAGE_SIZE as usize;
const TIMED: Duration = Duration::from_millis(100);

type Message = (u32, Vec<u8>);

pub fn run<P: Printer>(suite: &mut Suite<P>) {
    suite.run("mq", |case| {
        let result = mq(case);
        let _ = MessageQueue::unlink(NAME);
        result
    });
}

fn messages(sent: &[(u32, &str)]) -> Vec<Message> {
    sent.iter()
        .map(|&(prio, payload)| (prio, payload.as_bytes().to_vec()))
        .collect()
}

fn send_all(queue: &MessageQueue, sent: &[Message]) -> SysResult<()> {
    sent.iter()
        .try_for_each(|(prio, payload)| queue.send(payload, *prio))
}

/// Receives `n` messages, each wait bounded by `deadline`.
fn drain(queue: &MessageQueue, n: usize, deadline: Duration) -> SysResult<Vec<Message>> {
    let mut buf = [0u8; BUFFER_SIZE];
    (0..n)
        .map(|_| {
            let (len, prio) = queue.receive_timeout(&mut buf, deadline)?;
            Ok((prio, buf[..len].to_vec()))
        })
        .collect()
}

fn mq<P: Printer>(case: &mut Case<'_, P>) -> CaseResult {
    let existed = MessageQueue::unlink(NAME).is_ok();
    case.key("mqExists", existed);
    let created = MessageQueue::create_exclusive(NAME, CAPACITY, MESSAGE_SIZE);
    exercise(case, created)
}

/// Everything after the exclusive create. Support is judged on `created`
/// before anything else is checked.
fn exercise<P: Printer>(case: &mut Case<'_, P>, created: SysResult<MessageQueue>) -> CaseResult {
    let queue = match created {
        Err(e) if e.is_unsupported() => return case.not_supported("message queues not supported"),
        other => case.require_ok("create exclusive", other)?,
    };

    let _ = MessageQueue::unlink(MISSING);
    case.expect(Check::fails_with("open missing", &MessageQueue::open(MISSING), Errno::ENOENT));
    case.expect(Check::fails_with(
        "create exclusive again",
        &MessageQueue::create_exclusive(NAME, CAPACITY, MESSAGE_SIZE),
        Errno::EEXIST,
    ));
    case.expect(Check::fails_with(
        "oversized send",
        &queue.send(&[0u8; BUFFER_SIZE + 1], 0),
        Errno::EMSGSIZE,
    ));
    let reopened = case.require_ok("create existing", MessageQueue::create(NAME, CAPACITY, MESSAGE_SIZE))?;
    case.expect(Check::eq(
        "attributes",
        reopened.info(),
        Ok(MqInfo {
            max_messages: CAPACITY,
            message_size: MESSAGE_SIZE,
            current_messages: 0,
        }),
    ));
    drop(reopened);

    let mut buf = [0u8; BUFFER_SIZE];
    {
        let mut scope = case.timed("receiveTimed", TimingWindow::from_millis(100, 250));
        let received = queue.receive_timeout(&mut buf, TIMED);
        scope.expect(Check::fails_with("receive on empty", &received, Errno::ETIMEDOUT));
    }

    let fifo = messages(&[(0, "first"), (0, "second"), (0, "third"), (0, "fourth")]);
    for (count, (prio, payload)) in (1..).zip(&fifo) {
        case.require_ok("send", queue.send(payload, *prio))?;
        let current = queue.info().map(|info| info.current_messages);
        case.expect(Check::eq(format!("count after send {count}"), current, Ok(count)));
    }
    {
        let mut scope = case.timed("sendTimed", TimingWindow::from_millis(100, 250));
        let sent = queue.send_timeout(b"overflow", 0, TIMED);
        scope.expect(Check::fails_with("send on full", &sent, Errno::ETIMEDOUT));
    }
    let received = case.require_ok("drain fifo", drain(&queue, fifo.len(), case.deadline()))?;
    case.expect(Check::eq("fifo", &received, &fifo));

    for (name, sent) in [
        ("ascending", messages(&[(1, "one"), (2, "two"), (3, "three"), (4, "four")])),
        ("descending", messages(&[(4, "four"), (3, "three"), (2, "two"), (1, "one")])),
        ("ties", messages(&[(2, "A"), (2, "B"), (1, "C"), (1, "D")])),
    ] {
        case.require_ok("send", send_all(&queue, &sent))?;
        let received = case.require_ok("drain", drain(&queue, sent.len(), case.deadline()))?;
        case.expect(Check::drain_order(name, &sent, &received));
    }

    let queue = Arc::new(queue);
    worker_drain(case, &queue)?;
    deferred_destruction(case, &queue)
}

/// The tie-breaking drain, received on a worker thread.
fn worker_drain<P: Printer>(case: &mut Case<'_, P>, queue: &Arc<MessageQueue>) -> CaseResult {
    let sent = messages(&[(2, "A"), (2, "B"), (1, "C"), (1, "D")]);
    case.require_ok("send", send_all(queue, &sent))?;

    let deadline = case.deadline();
    let n = sent.len();
    let mut rendezvous = case.rendezvous(Arc::clone(queue));
    case.require_ok("spawn", rendezvous.spawn("receiver", move |q| drain(q, n, deadline)))?;
    for received in case.require_ok("join", rendezvous.join_values())? {
        let received = case.require_ok("worker drain", received)?;
        case.expect(Check::drain_order("worker", &sent, &received));
    }
    Ok(())
}

/// An unlinked queue stays usable through descriptors that were open.
fn deferred_destruction<P: Printer>(case: &mut Case<'_, P>, queue: &Arc<MessageQueue>) -> CaseResult {
    let gate = Arc::new(Gate::new(2));
    let deadline = case.deadline();
    let mut rendezvous = case.rendezvous(Arc::clone(&gate));
    case.require_ok(
        "spawn",
        rendezvous.spawn("holder", move |gate: &Gate| {
            let handle = MessageQueue::open(NAME);
            let opened = gate.arrive_and_wait(deadline);
            let unlinked = gate.arrive_and_wait(deadline);
            match handle {
                Ok(handle) => {
                    let sent = handle.send(b"after unlink", 3);
                    let received = drain(&handle, 1, deadline);
                    Check::that(opened && unlinked, "worker gates")
                        & Check::ok("send after unlink", &sent)
                        & Check::eq("receive after unlink", received, Ok(vec![(3, b"after unlink".to_vec())]))
                }
                Err(e) => Check::that(false, "worker open").detail(format!("failed: {e:?}")),
            }
        }),
    )?;
    let opened = gate.arrive_and_wait(deadline);
    case.expect(Check::ok("mq_unlink", &MessageQueue::unlink(NAME)));
    let unlinked = gate.arrive_and_wait(deadline);
    case.expect(Check::that(opened && unlinked, "main gates"));
    for check in case.require_ok("join", rendezvous.join_values())? {
        case.expect(check);
    }

    case.expect(Check::ok("send on open descriptor", &queue.send(b"still open", 0)));
    case.expect(Check::eq(
        "receive on open descriptor",
        drain(queue, 1, deadline),
        Ok(vec![(0, b"still open".to_vec())]),
    ));
    case.expect(Check::fails_with("reopen after unlink", &MessageQueue::open(NAME), Errno::ENOENT));
    Ok(())
}
