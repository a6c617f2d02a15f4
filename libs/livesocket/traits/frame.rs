use tokio_tungstenite::tungstenite::Message;

/// Raw transport frame, text or binary.
///
/// Control frames (ping, pong, close) never surface as a `Frame`; the
/// transport answers them itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Get the frame as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(s) => Some(s),
            Frame::Binary(_) => None,
        }
    }

    /// Get the frame as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Frame::Text(_) => None,
            Frame::Binary(b) => Some(b),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Frame::Text(_))
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(s) => s.len(),
            Frame::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn into_tungstenite(self) -> Message {
        match self {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data),
        }
    }

    pub(crate) fn from_tungstenite(msg: Message) -> Option<Frame> {
        match msg {
            Message::Text(text) => Some(Frame::Text(text)),
            Message::Binary(data) => Some(Frame::Binary(data)),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_frames_are_filtered() {
        assert!(Frame::from_tungstenite(Message::Ping(vec![1])).is_none());
        assert!(Frame::from_tungstenite(Message::Pong(vec![])).is_none());
        assert!(Frame::from_tungstenite(Message::Close(None)).is_none());
    }

    #[test]
    fn test_text_frame_accessors() {
        let frame = Frame::from_tungstenite(Message::Text("hello".into())).unwrap();
        assert!(frame.is_text());
        assert_eq!(frame.as_text(), Some("hello"));
        assert_eq!(frame.as_binary(), None);
        assert_eq!(frame.len(), 5);
    }
}
