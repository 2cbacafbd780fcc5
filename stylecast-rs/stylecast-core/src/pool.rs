use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use tracing::warn;

/// Run `task` for every index in `0..count` on at most `limit` named worker
/// threads and return the results in index order.
///
/// Workers pull indices from a shared counter, so one slow task never holds
/// back the rest. If no worker thread can be spawned the tasks run on the
/// calling thread instead.
pub(crate) fn run_bounded<R, F>(count: usize, limit: usize, name: &str, task: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> R + Sync,
{
    let workers = limit.max(1).min(count);
    if workers <= 1 {
        return (0..count).map(&task).collect();
    }

    let next = AtomicUsize::new(0);
    let (sender, receiver) = mpsc::channel();

    let spawned = thread::scope(|scope| {
        let mut spawned = 0;
        for worker in 0..workers {
            let sender = sender.clone();
            let next = &next;
            let task = &task;
            let handle = thread::Builder::new()
                .name(format!("{name}-{worker}"))
                .spawn_scoped(scope, move || {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        if index >= count {
                            break;
                        }
                        if sender.send((index, task(index))).is_err() {
                            break;
                        }
                    }
                });
            match handle {
                Ok(_) => spawned += 1,
                Err(error) => warn!(worker, %error, "failed to spawn {name} worker"),
            }
        }
        drop(sender);
        spawned
    });

    if spawned == 0 {
        return (0..count).map(&task).collect();
    }

    let mut slots: Vec<Option<R>> = (0..count).map(|_| None).collect();
    for (index, result) in receiver {
        slots[index] = Some(result);
    }
    // Every index is claimed exactly once and a panicking worker aborts the
    // scope above, so all slots are filled here.
    slots.into_iter().flatten().collect()
}
