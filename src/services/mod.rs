pub mod assignment_builder;
pub mod classroom_service;
pub mod context_codec;
pub mod defaults_store;
pub mod error_log;
pub mod folder_service;
pub mod form_builder;
pub mod handler_registry;
pub mod layout;
pub mod peer_table;
pub mod roster;
pub mod roster_reader;

pub use classroom_service::ClassroomService;
pub use context_codec::ContextCodec;
pub use defaults_store::DefaultsStore;
pub use error_log::{ErrorEntry, ErrorLog, FileErrorLog, MemoryErrorLog};
pub use form_builder::{BuiltForm, FormBuilder};
pub use handler_registry::{HandlerRecord, HandlerRegistry, RegisteredHandler};
pub use layout::{LayoutContext, TableLayout};
pub use peer_table::PeerTable;
pub use roster_reader::{read_roster, RosterSnapshot};
