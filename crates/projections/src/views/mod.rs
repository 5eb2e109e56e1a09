mod inquiry_board;
mod notification_inbox;
mod order_board;

pub use inquiry_board::InquiryBoardView;
pub use notification_inbox::{InboxEntry, NotificationInboxView};
pub use order_board::{OrderBoardView, OrderSummary};
