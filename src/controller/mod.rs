pub mod cluster;
pub mod context;
pub mod credentials;
pub mod deletion;
pub mod engine;
pub mod environment;
pub mod error;
pub mod model;
pub mod operator;
pub mod state;
pub mod validation;

pub use cluster::{
    create_cluster, delete_cluster, ensure_ready, list_clusters, restart_cluster, update_cluster,
};
pub use context::{Context, EngineSettings};
pub use credentials::get_credentials;
pub use engine::{DatabaseEngine, EngineKind, Psmdb, Xtradb};
pub use environment::{
    Environment, EnvironmentMode, EnvironmentProbe, Exposure, StaticEnvironment,
    StorageClassProbe,
};
pub use error::{Error, Result, StoreResultExt};
pub use model::{
    ClusterParams, ClusterRecord, ComputeResources, Credentials, OperatorStatus, Operators,
    PsmdbWorkloads, Workload, XtraDbWorkloads,
};
pub use operator::{check_operators, install_or_upgrade_operator};
pub use state::ClusterState;
pub use validation::{validate_name, validate_version};
