//! Services and read models shared by every handler.

use event_store::EventStore;
use domain::cart::CartService;
use domain::inventory::InventoryLedger;
use domain::notification::{NotificationService, OutboundDispatcher};
use negotiation::InquiryEngine;
use projections::{
    InquiryBoardView, NotificationInboxView, OrderBoardView, Projection, ProjectionProcessor,
};
use saga::OrderFulfillmentSaga;

use crate::error::ApiError;

pub struct AppState<S: EventStore> {
    pub ledger: InventoryLedger<S>,
    pub carts: CartService<S>,
    pub orders: OrderFulfillmentSaga<S>,
    pub inquiries: InquiryEngine<S>,
    pub notifications: NotificationService<S>,
    pub order_board: OrderBoardView,
    pub inbox: NotificationInboxView,
    pub inquiry_board: InquiryBoardView,
    pub processor: ProjectionProcessor<S>,
}

impl<S: EventStore + Clone> AppState<S> {
    pub fn new(store: S, outbound: OutboundDispatcher, max_attempts: u32) -> Self {
        let order_board = OrderBoardView::new();
        let inbox = NotificationInboxView::new();
        let inquiry_board = InquiryBoardView::new();

        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(order_board.clone()) as Box<dyn Projection>);
        processor.register(Box::new(inbox.clone()));
        processor.register(Box::new(inquiry_board.clone()));

        Self {
            ledger: InventoryLedger::new(store.clone()).with_max_attempts(max_attempts),
            carts: CartService::new(store.clone()).with_max_attempts(max_attempts),
            orders: OrderFulfillmentSaga::new(store.clone(), outbound.clone())
                .with_max_attempts(max_attempts),
            inquiries: InquiryEngine::new(store.clone(), outbound)
                .with_max_attempts(max_attempts),
            notifications: NotificationService::new(store).with_max_attempts(max_attempts),
            order_board,
            inbox,
            inquiry_board,
            processor,
        }
    }

    /// Catches every read model up with the store before a listing.
    pub async fn refresh_views(&self) -> Result<(), ApiError> {
        self.processor.run_catch_up().await?;
        Ok(())
    }
}
