pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] payment_core_types::CoreError),
    #[error(transparent)]
    Config(#[from] config_resolver::Error),
    #[error(transparent)]
    Dispatch(#[from] resilient_dispatcher::Error),
}
