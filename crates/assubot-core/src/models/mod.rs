pub mod contract;
pub mod user;

pub use contract::{
    Contract, ContractDocument, ContractPage, DashboardStats, Guarantee, InitContractRequest,
    ListContractsArgs, SummarizeStatus, UploadUrlRequest, UploadUrlResponse,
};
pub use user::{LoginRequest, ProfileUpdate, SessionPayload, SignupRequest, User};
