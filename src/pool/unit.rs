//! Capabilities the pool drives but does not own.
//!
//! A [`Producer`] runs once inside a worker process; a [`Consumer`] runs in
//! the coordinator once per completed worker.

/// Produces one payload inside a worker process.
///
/// Returning `None` (or panicking) is treated as an empty payload.
pub trait Producer {
    fn produce(&mut self) -> Option<Vec<u8>>;
}

impl<F> Producer for F
where
    F: FnMut() -> Option<Vec<u8>>,
{
    fn produce(&mut self) -> Option<Vec<u8>> {
        self()
    }
}

/// Receives worker payloads in the coordinator, in reap order.
pub trait Consumer {
    fn consume(&mut self, payload: Vec<u8>);
}

impl<F> Consumer for F
where
    F: FnMut(Vec<u8>),
{
    fn consume(&mut self, payload: Vec<u8>) {
        self(payload)
    }
}

/// Collects every payload.
impl Consumer for Vec<Vec<u8>> {
    fn consume(&mut self, payload: Vec<u8>) {
        self.push(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_producer() {
        let mut calls = 0;
        let mut producer = || {
            calls += 1;
            Some(b"payload".to_vec())
        };
        assert_eq!(Producer::produce(&mut producer), Some(b"payload".to_vec()));
        drop(producer);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_boxed_producer() {
        let mut producer: Box<dyn Producer> = Box::new(|| None::<Vec<u8>>);
        assert_eq!(producer.produce(), None);
    }

    #[test]
    fn test_vec_consumer_collects() {
        let mut sink: Vec<Vec<u8>> = Vec::new();
        sink.consume(b"a".to_vec());
        sink.consume(Vec::new());
        assert_eq!(sink, vec![b"a".to_vec(), Vec::new()]);
    }

    #[test]
    fn test_closure_consumer() {
        let mut total = 0;
        {
            let mut sink = |payload: Vec<u8>| total += payload.len();
            Consumer::consume(&mut sink, b"abc".to_vec());
            Consumer::consume(&mut sink, b"de".to_vec());
        }
        assert_eq!(total, 5);
    }
}
