//! `ShellSessionRegistry` — live shell subprocess sessions, buffered output,
//! and the `exec_command` / `write_stdin` / `close_session` tool trio.

pub mod exec;
pub mod output;
pub mod session;
pub mod tools;

pub use exec::{exec_command, ExecCommandRequest, ExecCommandResponse};
pub use output::OutputBuffer;
pub use session::{ShellSession, ShellSessionRegistry, SessionStatus};
pub use tools::{
    close_session, write_stdin, CloseSessionRequest, CloseSessionResponse, WriteStdinRequest,
    WriteStdinResponse,
};
