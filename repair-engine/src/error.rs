use payment_core_types::CoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("repair {transaction_reference}/{tenant_id} not found")]
    NotFound {
        transaction_reference: String,
        tenant_id: String,
    },
}
