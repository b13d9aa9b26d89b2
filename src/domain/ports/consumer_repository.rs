use crate::domain::entities::Consumer;
use crate::domain::errors::DomainResult;

/// Consumers are managed elsewhere; the engine only needs to resolve them.
#[async_trait::async_trait]
pub trait ConsumerRepository: Send + Sync {
    async fn create_consumer(&self, consumer: &Consumer) -> DomainResult<()>;

    async fn get_consumer_by_id(&self, id: &str) -> DomainResult<Option<Consumer>>;
}
