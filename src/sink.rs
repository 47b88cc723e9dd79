use crate::cancel::CancelToken;
use crate::console::Console;
use crossbeam::channel::{select, Receiver};

/// Terminal consumer: report every value until the sequence closes or the
/// token fires. Returns how many values were reported.
pub fn consume(cancel: &CancelToken, input: &Receiver<i64>, console: &Console) -> u64 {
    let mut delivered = 0;
    loop {
        select! {
            recv(input) -> msg => match msg {
                Ok(value) if !cancel.is_cancelled() => {
                    console.processed(value);
                    delivered += 1;
                }
                _ => break,
            },
            recv(cancel.signal()) -> _ => break,
        }
    }
    tracing::debug!(delivered, "consumer stopped");
    delivered
}
