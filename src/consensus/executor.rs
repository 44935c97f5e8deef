use super::message::RequestMessage;

/// Turns a committed request into the result carried by the reply.
pub trait Executor: Send + 'static {
    fn execute(&mut self, request: &RequestMessage) -> String;
}

/// Acknowledges the operation without interpreting it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoExecutor;

impl Executor for EchoExecutor {
    fn execute(&mut self, request: &RequestMessage) -> String {
        format!(
            "operation:{} message:{} digest:{} done",
            request.operation,
            request.request.message,
            request.digest()
        )
    }
}
