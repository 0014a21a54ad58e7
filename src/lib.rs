//! 事件驱动处理器模拟器的GDB远程调试桩
//!
//! 宿主调试器通过TCP套接字使用远程串行协议（RSP）访问模拟处理器的
//! 体系结构状态，并控制虚拟时间的推进。模拟器内核通过[`abi`]和[`sim`]
//! 中的两个小接口与调试桩协作，在每条指令边界调用
//! [`debugger::GdbStub::on_issue`]。

pub mod abi;
pub mod debugger;
pub mod sim;

pub use abi::{AbiError, IssueWidth, ProcessorAbi};
pub use debugger::{
    AccessKind, Breakpoint, BreakpointKind, BreakpointManager, GdbRequest, GdbResponse, GdbStub,
    StopReason, WireError, DEFAULT_PORT,
};
pub use sim::{PauseCallback, SimControl};
