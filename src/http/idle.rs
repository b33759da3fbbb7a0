use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{sleep, Instant, Sleep};

/// Reader that fails with [`io::ErrorKind::TimedOut`] once no bytes have
/// arrived for `timeout`
///
/// The clock starts when a read first has to wait and restarts after every
/// completed read, so a slow upload that keeps making progress is never cut
/// off. Time spent not reading (writing a response, say) does not count.
#[derive(Debug)]
pub struct IdleTimeout<R> {
    inner: R,
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl<R> IdleTimeout<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            sleep: Box::pin(sleep(timeout)),
            armed: false,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for IdleTimeout<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if let Poll::Ready(result) = Pin::new(&mut this.inner).poll_read(cx, buf) {
            this.armed = false;
            return Poll::Ready(result);
        }

        if !this.armed {
            let deadline = Instant::now() + this.timeout;
            this.sleep.as_mut().reset(deadline);
            this.armed = true;
        }
        ready!(this.sleep.as_mut().poll(cx));
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no data received for {:?}", this.timeout),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_idle_reader_times_out() {
        let (_writer, reader) = tokio::io::duplex(64);
        let mut reader = IdleTimeout::new(reader, Duration::from_millis(100));

        let mut buf = [0u8; 8];
        let err = reader.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_progress_restarts_the_clock() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut reader = IdleTimeout::new(reader, Duration::from_millis(100));

        tokio::spawn(async move {
            for byte in b"abcdef" {
                tokio::time::sleep(Duration::from_millis(40)).await;
                writer.write_all(&[*byte]).await.unwrap();
            }
        });

        // 240ms in total, never more than 40ms between bytes
        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"abcdef");
    }
}
