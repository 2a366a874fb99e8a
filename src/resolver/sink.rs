//! Where a resolved fragment's content goes.

use tokio::sync::oneshot;

/// Receives a fragment's final content exactly once.
///
/// `end` consumes the sink, so a second write cannot compile.
pub trait OutputSink: Send {
    fn end(self, content: String);
}

/// Sink backed by a oneshot channel; the receiver side is the join point.
#[derive(Debug)]
pub struct ChannelSink {
    tx: oneshot::Sender<String>,
}

impl OutputSink for ChannelSink {
    fn end(self, content: String) {
        // A dropped receiver means nobody is waiting for this fragment any more.
        let _ = self.tx.send(content);
    }
}

/// A sink and the receiver its content arrives on.
pub fn channel() -> (ChannelSink, oneshot::Receiver<String>) {
    let (tx, rx) = oneshot::channel();
    (ChannelSink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers_content() {
        let (sink, rx) = channel();
        sink.end("<div>header</div>".to_string());
        assert_eq!(rx.await.unwrap(), "<div>header</div>");
    }

    #[test]
    fn test_end_after_receiver_dropped_is_silent() {
        let (sink, rx) = channel();
        drop(rx);
        sink.end("late".to_string());
    }
}
