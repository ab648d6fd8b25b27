use payment_core_types::CoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] config_resolver::Error),
    #[error(transparent)]
    Mapping(#[from] payload_mapper::Error),
    #[error(transparent)]
    Dispatch(#[from] resilient_dispatcher::Error),
    #[error(transparent)]
    Fraud(#[from] fraud_gate::Error),
    #[error(transparent)]
    Routing(#[from] routing_decider::Error),
}
