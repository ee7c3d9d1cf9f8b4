//! Hello extensions understood by the engine.
//!
//! Each extension parses from the `extension_data` of an
//! [`Extension`](super::Extension). `decode` wraps `parse` with the error the
//! handshake reports for a malformed or empty value.

pub mod ec_point_formats;
pub mod renegotiation_info;
pub mod server_name;
pub mod signature_algorithms;
pub mod supported_groups;

pub use ec_point_formats::ECPointFormatsExtension;
pub use renegotiation_info::RenegotiationInfoExtension;
pub use server_name::ServerNameExtension;
pub use signature_algorithms::SignatureAlgorithmsExtension;
pub use supported_groups::SupportedGroupsExtension;
