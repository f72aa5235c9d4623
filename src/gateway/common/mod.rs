pub mod dispatch;
pub mod retry;
