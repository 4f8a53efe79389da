use folje_fixtures::FixtureError;
use thiserror::Error;

/// Errors raised by the interpolation engine, the console and the sACN output path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FollowError {
    #[error("invalid interpolation input: {0}")]
    InvalidInput(String),

    #[error("triangulation failed: {0}")]
    TriangulationFailure(String),

    #[error("triangle vertices are collinear")]
    CollinearTriangle,

    #[error("sACN sender unavailable: {0}")]
    SenderUnavailable(String),

    #[error("failed to activate universe {universe}: {reason}")]
    UniverseActivationFailure { universe: u16, reason: String },

    #[error("fixture {0} does not exist")]
    UnknownFixture(String),

    #[error(transparent)]
    Fixture(#[from] FixtureError),
}
