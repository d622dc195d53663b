pub mod dispatcher;
pub mod messages;
pub mod producer;

pub use dispatcher::NotificationDispatcher;
pub use producer::KafkaNotificationProducer;
