use std::{
    future::Future,
    task::{Context, Poll},
    thread,
    time::Duration,
};

use futures::task::noop_waker_ref;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Drives a future to completion on the calling thread.
///
/// The storage client contract is blocking request/response, so SDK
/// futures are polled here instead of being handed to the caller.
pub fn poll_until_ready<Fut>(future: Fut) -> Fut::Output
where
    Fut: Future,
{
    let mut future = Box::pin(future);
    let mut context = Context::from_waker(noop_waker_ref());

    loop {
        match future.as_mut().poll(&mut context) {
            Poll::Ready(result) => {
                return result;
            }
            Poll::Pending => {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;

    use super::*;

    struct PendingFor {
        remaining: u32,
    }

    impl Future for PendingFor {
        type Output = Result<u32, String>;

        fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
            if self.remaining == 0 {
                return Poll::Ready(Ok(7));
            }
            self.remaining -= 1;
            Poll::Pending
        }
    }

    #[test]
    fn test_poll_ready() {
        assert_eq!(poll_until_ready(futures::future::ready(3)), 3);
    }

    #[test]
    fn test_poll_pending() {
        assert_eq!(poll_until_ready(PendingFor { remaining: 2 }), Ok(7));
    }
}
