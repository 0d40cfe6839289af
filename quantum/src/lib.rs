pub mod basis;
pub mod error;
pub mod special;
pub mod spins;
pub mod storage;
pub mod utility;

pub use basis::{BasisParams, QuantumBasis};
pub use error::{BasisError, StorageError};
pub use storage::{MatrixStorage, Storage, StorageKind};
