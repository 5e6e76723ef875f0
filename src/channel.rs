use std::collections::VecDeque;

pub type ChannelCallback = Box<dyn FnMut(&str)>;

/// Log/error reporting path from the runtime to the host, decoupled from
/// exceptions. Emitting never fails; when a buffer is full the oldest entry
/// is dropped.
pub struct FaultChannel {
    logs: VecDeque<String>,
    errors: VecDeque<String>,
    capacity: usize,
    on_log: Option<ChannelCallback>,
    on_error: Option<ChannelCallback>,
}

impl FaultChannel {
    pub fn new(capacity: usize) -> Self {
        Self { logs: VecDeque::new(), errors: VecDeque::new(), capacity, on_log: None, on_error: None }
    }

    pub fn emit_log(&mut self, message: impl Into<String>) {
        let message = message.into();
        if let Some(callback) = self.on_log.as_mut() {
            callback(&message);
        }
        push_bounded(&mut self.logs, message, self.capacity);
    }

    pub fn emit_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if let Some(callback) = self.on_error.as_mut() {
            callback(&message);
        }
        push_bounded(&mut self.errors, message, self.capacity);
    }

    pub fn set_log_callback(&mut self, callback: ChannelCallback) {
        self.on_log = Some(callback);
    }

    pub fn set_error_callback(&mut self, callback: ChannelCallback) {
        self.on_error = Some(callback);
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.iter().cloned().collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.iter().cloned().collect()
    }

    pub fn take_logs(&mut self) -> Vec<String> {
        self.logs.drain(..).collect()
    }

    pub fn take_errors(&mut self) -> Vec<String> {
        self.errors.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.logs.clear();
        self.errors.clear();
    }
}

fn push_bounded(buffer: &mut VecDeque<String>, message: String, capacity: usize) {
    if capacity > 0 && buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn buffers_are_bounded_and_drop_oldest() {
        let mut channel = FaultChannel::new(2);
        channel.emit_log("one");
        channel.emit_log("two");
        channel.emit_log("three");
        assert_eq!(channel.logs(), vec!["two".to_string(), "three".to_string()]);
    }

    #[test]
    fn callbacks_observe_every_entry() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut channel = FaultChannel::new(8);
        channel.set_error_callback(Box::new(move |message| sink.borrow_mut().push(message.to_string())));
        channel.emit_error("boom");
        channel.emit_log("quiet");
        assert_eq!(seen.borrow().as_slice(), &["boom".to_string()]);
    }

    #[test]
    fn clear_empties_both_buffers() {
        let mut channel = FaultChannel::new(8);
        channel.emit_log("a");
        channel.emit_error("b");
        channel.clear();
        assert!(channel.logs().is_empty());
        assert!(channel.errors().is_empty());
    }
}
