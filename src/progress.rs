use log::{debug, info, warn};
use tokio::sync::mpsc;

/// 扫描进度消息的输出端
///
/// 没有通道时消息写入 info 日志；调用方提供了通道（例如 CLI 或 UI）时由接收端负责展示，
/// 日志只保留 debug 级别。
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<String>>,
}

impl ProgressReporter {
    /// 只写日志，不转发
    pub fn silent() -> Self {
        Self { sender: None }
    }

    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// 创建一个带接收端的 reporter
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, message: impl Into<String>) {
        self.forward(message.into(), log::Level::Info);
    }

    /// 失败类消息，没有通道时以 warn 级别写入日志
    pub fn warn(&self, message: impl Into<String>) {
        self.forward(message.into(), log::Level::Warn);
    }

    fn forward(&self, message: String, level: log::Level) {
        match &self.sender {
            Some(sender) => {
                debug!("{}", message);
                // 接收端已关闭时丢弃消息
                let _ = sender.send(message);
            }
            None if level == log::Level::Warn => warn!("{}", message),
            None => info!("{}", message),
        }
    }
}
