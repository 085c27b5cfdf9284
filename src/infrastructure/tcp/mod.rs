// TCP module - Listener and per-connection reader tasks
pub mod acceptor;
pub mod reader;

pub use acceptor::AcceptorHandle;
pub use reader::ReaderHandle;
