//! GDB调试支持模块
//!
//! 调试桩在模拟器线程和监听线程之间仲裁：模拟器在每条指令边界调用
//! `on_issue`，命中断点或步进条件时就地阻塞、轮流处理调试器请求；
//! 监听线程只负责读套接字，把带外的0x03中断转成共享停机标志。

mod breakpoints;
mod connection;
mod protocol;

pub use breakpoints::{Breakpoint, BreakpointKind, BreakpointManager};
pub use connection::WireError;
pub use protocol::{GdbRequest, GdbResponse};

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::abi::{IssueWidth, ProcessorAbi};
use crate::sim::SimControl;
use connection::{GdbConnection, INTERRUPT_BYTE};
use protocol::value_to_bytes;

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 1500;

// 停止报文使用的信号编号
const SIGQUIT: u8 = 3;
const SIGILL: u8 = 4;
const SIGTRAP: u8 = 5;
const SIGABRT: u8 = 6;

// 停机单元的位布局：低两位是步进相位，高位是停止的附加原因
const STEP_MASK: u8 = 0b0011;
const STEP_ARMED: u8 = 1;
const STEP_STOP: u8 = 2;
const TIMEOUT_FLAG: u8 = 0b0100;
const INTR_FLAG: u8 = 0b1000;

/// 停止原因
///
/// 模拟器停下的瞬间产生，由紧随其后的线路交互消费。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason<W: IssueWidth> {
    /// 命中断点或观察点
    Break(Breakpoint<W>),
    /// 单步完成
    Step,
    /// 处理器执行出错
    Segfault,
    /// 限时继续的时间预算耗尽
    Timeout,
    /// 外部暂停请求
    Paused,
    /// 异步中断等未知来源
    Unknown,
}

/// 内存访问方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// 跨线程共享的停机标志
///
/// 监听线程和定时暂停回调只写这里，模拟器线程在指令边界读取。
struct SharedFlags {
    halt: AtomicU8,
    /// 模拟器线程是否正在请求循环中
    dialog: AtomicBool,
    /// 监听线程报告连接已失效
    conn_lost: AtomicBool,
}

impl SharedFlags {
    fn new() -> Self {
        Self {
            halt: AtomicU8::new(0),
            dialog: AtomicBool::new(false),
            conn_lost: AtomicBool::new(false),
        }
    }

    /// 异步中断：请求在下一个指令边界停下
    fn interrupt(&self) {
        let _ = self
            .halt
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(STEP_STOP | INTR_FLAG | (v & TIMEOUT_FLAG))
            });
    }

    /// 定时暂停回调：停下并标记超时
    fn arm_timeout(&self) {
        self.halt.store(STEP_STOP | TIMEOUT_FLAG, Ordering::SeqCst);
    }
}

/// GDB远程调试桩
///
/// 独占断点表、线路连接和控制状态；处理器ABI和模拟器控制接口
/// 由每次调用传入，只在模拟器暂停期间使用。
pub struct GdbStub<W: IssueWidth> {
    conn: Option<GdbConnection>,
    breakpoints: BreakpointManager<W>,
    flags: Arc<SharedFlags>,
    /// 断点查询是否生效，暂停期间关闭
    break_enabled: bool,
    connected: bool,
    killed: bool,
    /// 限时继续的剩余预算（皮秒），0表示不限时
    time_to_go: u64,
    /// 最近一次恢复执行时的虚拟时间
    sim_start_time: u64,
    /// 最近一次停止的原因
    last_stop: StopReason<W>,
    /// 首个指令边界尚未到达
    first_run: bool,
}

impl<W: IssueWidth> GdbStub<W> {
    /// 创建新的调试桩，尚未连接调试器时所有钩子都是空操作
    pub fn new() -> Self {
        Self {
            conn: None,
            breakpoints: BreakpointManager::new(),
            flags: Arc::new(SharedFlags::new()),
            break_enabled: true,
            connected: false,
            killed: false,
            time_to_go: 0,
            sim_start_time: 0,
            last_stop: StopReason::Step,
            first_run: true,
        }
    }

    /// 在指定端口监听并等待调试器接入
    pub fn initialize(&mut self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(format!("localhost:{}", port))
            .with_context(|| format!("无法监听GDB调试端口 {}", port))?;
        info!(port, "等待GDB调试器连接");
        self.attach(listener)
    }

    /// 在已绑定的监听套接字上接受一个调试器连接
    pub fn attach(&mut self, listener: TcpListener) -> Result<()> {
        let (stream, peer) = listener.accept().context("接受GDB调试器连接失败")?;
        info!(%peer, "调试器已连接");

        let reader = stream.try_clone().context("复制调试连接的读端失败")?;
        let (tx, rx) = mpsc::channel();
        let flags = Arc::clone(&self.flags);
        thread::Builder::new()
            .name("gdb-listener".to_string())
            .spawn(move || listen_loop(reader, tx, flags))
            .context("启动监听线程失败")?;

        self.conn = Some(GdbConnection::new(stream, rx));
        self.connected = true;
        Ok(())
    }

    /// 调试器是否仍然连接
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// 指令边界钩子，模拟器在每条指令提交前调用
    pub fn on_issue<A, S>(&mut self, cpu: &mut A, sim: &mut S, pc: W)
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        if self.conn.is_none() {
            return;
        }
        if self.flags.conn_lost.load(Ordering::SeqCst) {
            self.handle_connection_loss();
            return;
        }

        if self.first_run {
            // 首个指令边界：等待调试器的初始握手
            self.first_run = false;
            self.break_enabled = false;
            self.run_dialog(cpu, sim);
        } else {
            self.check_step(cpu, sim);
            self.check_breakpoint(cpu, sim, pc);
        }
    }

    /// 内存访问钩子，模拟器在每次数据读写时调用
    pub fn on_mem_access<A, S>(&mut self, cpu: &mut A, sim: &mut S, addr: W, access: AccessKind)
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        if self.conn.is_none() || !self.break_enabled {
            return;
        }
        let Some(bp) = self.breakpoints.get(addr).copied() else {
            return;
        };
        let fires = match bp.kind {
            BreakpointKind::Write => access == AccessKind::Write,
            BreakpointKind::Read => access == AccessKind::Read,
            BreakpointKind::Access => true,
            BreakpointKind::CodeHw | BreakpointKind::CodeMem => false,
        };
        if fires {
            self.set_stopped(cpu, sim, StopReason::Break(bp));
        }
    }

    /// 外部暂停请求
    pub fn pause<A, S>(&mut self, cpu: &mut A, sim: &mut S)
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        if self.conn.is_some() {
            self.set_stopped(cpu, sim, StopReason::Paused);
        }
    }

    /// 处理器执行出错（非法指令、越界访问等）
    pub fn report_segfault<A, S>(&mut self, cpu: &mut A, sim: &mut S)
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        if self.conn.is_some() {
            self.set_stopped(cpu, sim, StopReason::Segfault);
        }
    }

    /// 模拟结束时的退出通知
    pub fn on_end_of_simulation(&mut self) {
        self.signal_program_end(false);
    }

    /// 向调试器通告程序结束，`error` 表示以错误告终
    pub fn signal_program_end(&mut self, error: bool) {
        if !self.connected {
            return;
        }
        if self.killed && !error {
            // 调试器主动结束的模拟不再通知
            return;
        }
        if error {
            self.send(&GdbResponse::Error);
        }
        let message = if error {
            "Program Ended With an Error\n"
        } else {
            "Program Correctly Ended\n"
        };
        self.send(&GdbResponse::Output(message.to_string()));
        let signal = if error { SIGABRT } else { SIGQUIT };
        self.send(&GdbResponse::Exit { signal });
    }

    /// 检查是否因步进或异步停止请求而需要停下
    #[inline(always)]
    fn check_step<A, S>(&mut self, cpu: &mut A, sim: &mut S)
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        let cell = self.flags.halt.load(Ordering::SeqCst);
        match cell & STEP_MASK {
            STEP_ARMED => {
                // 被单步命令武装的那条指令已经执行，下个边界停下
                self.flags.halt.store(STEP_STOP, Ordering::SeqCst);
            }
            STEP_STOP => {
                self.flags.halt.store(0, Ordering::SeqCst);
                if cell & TIMEOUT_FLAG != 0 {
                    self.set_stopped(cpu, sim, StopReason::Timeout);
                } else if cell & INTR_FLAG != 0 {
                    self.set_stopped(cpu, sim, StopReason::Unknown);
                } else {
                    self.set_stopped(cpu, sim, StopReason::Step);
                }
            }
            _ => {}
        }
    }

    /// 检查当前PC上是否有断点
    #[inline(always)]
    fn check_breakpoint<A, S>(&mut self, cpu: &mut A, sim: &mut S, pc: W)
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        if self.break_enabled && self.breakpoints.has(pc) {
            let bp = *self.breakpoints.get(pc).unwrap_or_else(|| {
                panic!("因断点停止，但断点表中查不到地址 {:#x}", pc);
            });
            self.set_stopped(cpu, sim, StopReason::Break(bp));
        }
    }

    /// 停止模拟并进入请求循环，直到调试器发出恢复类命令
    fn set_stopped<A, S>(&mut self, cpu: &mut A, sim: &mut S, reason: StopReason<W>)
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        let now = sim.now_ps();
        if self.time_to_go > 0 {
            self.time_to_go = self
                .time_to_go
                .saturating_sub(now.saturating_sub(self.sim_start_time));
            self.sim_start_time = now;
        }
        self.break_enabled = false;
        self.last_stop = reason.clone();

        self.flags.dialog.store(true, Ordering::SeqCst);
        self.awake_gdb(sim, &reason);
        while self.wait_for_request(cpu, sim) {}
        self.flags.dialog.store(false, Ordering::SeqCst);
    }

    /// 按停止原因唤醒调试器
    fn awake_gdb<S>(&mut self, sim: &S, reason: &StopReason<W>)
    where
        S: SimControl,
    {
        match reason {
            StopReason::Step => {
                self.send(&GdbResponse::Stop { signal: SIGTRAP });
            }
            StopReason::Break(bp) if bp.kind.is_code() => {
                self.send(&GdbResponse::Stop { signal: SIGTRAP });
            }
            StopReason::Break(bp) => {
                let key = match bp.kind {
                    BreakpointKind::Write => "watch",
                    BreakpointKind::Read => "rwatch",
                    BreakpointKind::Access => "awatch",
                    BreakpointKind::CodeHw | BreakpointKind::CodeMem => "none",
                };
                self.send(&GdbResponse::StopWithInfo {
                    signal: SIGTRAP,
                    info: vec![(key.to_string(), format!("{:x}", bp.address))],
                });
            }
            StopReason::Segfault => {
                self.send(&GdbResponse::Stop { signal: SIGILL });
            }
            StopReason::Timeout => {
                let message = format!(
                    "Specified Simulation time completed - Current simulation time: {} (ps)\n",
                    sim.now_ps()
                );
                self.send(&GdbResponse::Output(message));
                self.send_interrupt_byte();
            }
            StopReason::Paused => {
                let message = format!(
                    "Simulation Paused - Current simulation time: {} (ps)\n",
                    sim.now_ps()
                );
                self.send(&GdbResponse::Output(message));
                self.send_interrupt_byte();
            }
            StopReason::Unknown => {
                self.send_interrupt_byte();
            }
        }
    }

    /// 进入请求循环
    fn run_dialog<A, S>(&mut self, cpu: &mut A, sim: &mut S)
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        self.flags.dialog.store(true, Ordering::SeqCst);
        while self.wait_for_request(cpu, sim) {}
        self.flags.dialog.store(false, Ordering::SeqCst);
    }

    /// 接收一条请求并分发处理，返回是否继续留在请求循环
    fn wait_for_request<A, S>(&mut self, cpu: &mut A, sim: &mut S) -> bool
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        let little_endian = cpu.is_little_endian();
        let request = match &mut self.conn {
            Some(conn) => conn.receive_request::<W>(little_endian),
            None => return false,
        };

        match request {
            GdbRequest::StopReason => self.req_stop_reason(sim),
            GdbRequest::Continue { addr } => self.cont(cpu, sim, addr),
            GdbRequest::Step { addr } => self.do_step(cpu, sim, addr),
            GdbRequest::Detach => self.detach(sim),
            GdbRequest::Kill => self.kill_app(sim),
            GdbRequest::ReadRegisters => self.read_registers(cpu),
            GdbRequest::WriteRegisters { values } => self.write_registers(cpu, &values),
            GdbRequest::ReadRegister { index } => self.read_register(cpu, index),
            GdbRequest::WriteRegister { index, value } => self.write_register(cpu, index, value),
            GdbRequest::ReadMemory { addr, length } => self.read_memory(cpu, addr, length),
            GdbRequest::WriteMemory { addr, length, data } => {
                self.write_memory(cpu, addr, length, &data)
            }
            GdbRequest::AddBreakpoint {
                type_code,
                addr,
                length,
            } => self.add_breakpoint(type_code, addr, length),
            GdbRequest::RemoveBreakpoint { addr } => self.remove_breakpoint(addr),
            GdbRequest::Query { command, extension } => {
                self.generic_query(sim, &command, &extension)
            }
            GdbRequest::Interrupt => self.recv_intr(),
            GdbRequest::Error => {
                error!("与调试器的连接出错，连接即将终止");
                self.connected = false;
                self.resume_execution(sim);
                self.break_enabled = false;
                false
            }
            // 多线程、带信号恢复、单周期步进等请求一律回复空响应
            GdbRequest::ExtendedMode
            | GdbRequest::ContinueWithSignal
            | GdbRequest::StepWithSignal
            | GdbRequest::SetThread
            | GdbRequest::CycleStep
            | GdbRequest::CycleStepWithSignal
            | GdbRequest::BackwardSearch
            | GdbRequest::ThreadAlive
            | GdbRequest::Unknown => self.empty_action(),
        }
    }

    /// 恢复执行：重新打开断点并按需安排定时暂停
    fn resume_execution<S>(&mut self, sim: &mut S)
    where
        S: SimControl,
    {
        self.break_enabled = true;
        self.sim_start_time = sim.now_ps();
        if self.time_to_go > 0 {
            let flags = Arc::clone(&self.flags);
            sim.schedule_after(self.time_to_go, Box::new(move || flags.arm_timeout()));
        }
    }

    /// 监听线程报告连接失效后的善后
    fn handle_connection_loss(&mut self) {
        if self.connected {
            warn!("调试器连接丢失，清除断点后继续无监督执行");
        }
        self.breakpoints.clear_all();
        self.break_enabled = false;
        self.connected = false;
        self.flags.halt.store(0, Ordering::SeqCst);
        self.conn = None;
    }

    fn send(&mut self, response: &GdbResponse) {
        if let Some(conn) = &mut self.conn {
            if let Err(e) = conn.send_response(response) {
                warn!(error = %e, "发送响应失败");
                self.connected = false;
            }
        }
    }

    fn send_interrupt_byte(&mut self) {
        if let Some(conn) = &mut self.conn {
            if let Err(e) = conn.send_interrupt() {
                warn!(error = %e, "发送中断字节失败");
                self.connected = false;
            }
        }
    }

    // ---- 各类请求的处理方法 ----

    /// 回复空响应，表示请求不被支持
    fn empty_action(&mut self) -> bool {
        self.send(&GdbResponse::NotSupported);
        true
    }

    /// `?`：重新通告最近一次的停止原因
    fn req_stop_reason<S>(&mut self, sim: &S) -> bool
    where
        S: SimControl,
    {
        let reason = self.last_stop.clone();
        self.awake_gdb(sim, &reason);
        true
    }

    /// `c`：继续执行
    fn cont<A, S>(&mut self, cpu: &mut A, sim: &mut S, addr: Option<W>) -> bool
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        if let Some(addr) = addr {
            cpu.set_pc(addr);
        }
        self.resume_execution(sim);
        false
    }

    /// `s`：武装单步，下下个指令边界停下
    fn do_step<A, S>(&mut self, cpu: &mut A, sim: &mut S, addr: Option<W>) -> bool
    where
        A: ProcessorAbi<Word = W>,
        S: SimControl,
    {
        if let Some(addr) = addr {
            cpu.set_pc(addr);
        }
        self.flags.halt.store(STEP_ARMED, Ordering::SeqCst);
        self.resume_execution(sim);
        false
    }

    /// `D`：调试器断开，清理后继续无监督执行
    fn detach<S>(&mut self, sim: &mut S) -> bool
    where
        S: SimControl,
    {
        info!("调试器请求断开连接");
        self.breakpoints.clear_all();
        self.send(&GdbResponse::Ok);
        self.flags.halt.store(0, Ordering::SeqCst);
        self.connected = false;
        self.resume_execution(sim);
        self.break_enabled = false;
        false
    }

    /// `k`：结束整个模拟
    fn kill_app<S>(&mut self, sim: &mut S) -> bool
    where
        S: SimControl,
    {
        info!("调试器请求结束模拟");
        self.killed = true;
        sim.stop();
        false
    }

    /// `g`：读取全部寄存器，读失败的以0占位
    fn read_registers<A>(&mut self, cpu: &A) -> bool
    where
        A: ProcessorAbi<Word = W>,
    {
        let little_endian = cpu.is_little_endian();
        let mut data = Vec::with_capacity(cpu.gdb_reg_count() * W::BYTES);
        for i in 0..cpu.gdb_reg_count() {
            let value = cpu.read_gdb_reg(i).unwrap_or_else(|_| W::zero());
            data.extend_from_slice(&value_to_bytes(value, little_endian));
        }
        self.send(&GdbResponse::RegRead(data));
        true
    }

    /// `G`：写入全部寄存器
    fn write_registers<A>(&mut self, cpu: &mut A, values: &[W]) -> bool
    where
        A: ProcessorAbi<Word = W>,
    {
        let mut failed = false;
        for (i, &value) in values.iter().enumerate() {
            if cpu.write_gdb_reg(i, value).is_err() {
                failed = true;
            }
        }
        if failed || values.len() != cpu.gdb_reg_count() {
            self.send(&GdbResponse::Error);
        } else {
            self.send(&GdbResponse::Ok);
        }
        true
    }

    /// `p`：读取单个寄存器，越界或失败时返回0
    fn read_register<A>(&mut self, cpu: &A, index: usize) -> bool
    where
        A: ProcessorAbi<Word = W>,
    {
        let value = if index < cpu.gdb_reg_count() {
            cpu.read_gdb_reg(index).unwrap_or_else(|_| W::zero())
        } else {
            W::zero()
        };
        let little_endian = cpu.is_little_endian();
        self.send(&GdbResponse::RegRead(value_to_bytes(value, little_endian)));
        true
    }

    /// `P`：写入单个寄存器
    fn write_register<A>(&mut self, cpu: &mut A, index: usize, value: W) -> bool
    where
        A: ProcessorAbi<Word = W>,
    {
        if index < cpu.gdb_reg_count() && cpu.write_gdb_reg(index, value).is_ok() {
            self.send(&GdbResponse::Ok);
        } else {
            self.send(&GdbResponse::Error);
        }
        true
    }

    /// `m`：逐字节读取内存，不可读的以0占位
    fn read_memory<A>(&mut self, cpu: &A, addr: W, length: usize) -> bool
    where
        A: ProcessorAbi<Word = W>,
    {
        let mut data = Vec::with_capacity(length);
        for i in 0..length {
            let byte_addr = W::from_u64(addr.to_u64().wrapping_add(i as u64));
            data.push(cpu.read_mem_byte(byte_addr).unwrap_or(0));
        }
        self.send(&GdbResponse::MemRead(data));
        true
    }

    /// `M`/`X`：逐字节写入内存，首个失败即停止
    fn write_memory<A>(&mut self, cpu: &mut A, addr: W, length: usize, data: &[u8]) -> bool
    where
        A: ProcessorAbi<Word = W>,
    {
        let mut written = 0;
        let mut failed = false;
        for (i, &byte) in data.iter().enumerate() {
            let byte_addr = W::from_u64(addr.to_u64().wrapping_add(i as u64));
            match cpu.write_mem_byte(byte_addr, byte) {
                Ok(()) => written += 1,
                Err(e) => {
                    debug!(error = %e, "内存写入失败");
                    failed = true;
                    break;
                }
            }
        }
        if failed || written != length {
            self.send(&GdbResponse::Error);
        } else {
            self.send(&GdbResponse::Ok);
        }
        true
    }

    /// `Z`：添加断点或观察点
    fn add_breakpoint(&mut self, type_code: u32, addr: W, length: usize) -> bool {
        let kind = match type_code {
            0 => BreakpointKind::CodeMem,
            1 => BreakpointKind::CodeHw,
            2 => BreakpointKind::Write,
            3 => BreakpointKind::Read,
            4 => BreakpointKind::Access,
            _ => {
                self.send(&GdbResponse::NotSupported);
                return true;
            }
        };
        if self.breakpoints.add(kind, addr, length) {
            debug!(?kind, address = %format_args!("{:#x}", addr), "添加断点");
            self.send(&GdbResponse::Ok);
        } else {
            self.send(&GdbResponse::Error);
        }
        true
    }

    /// `z`：移除指定地址上的断点
    fn remove_breakpoint(&mut self, addr: W) -> bool {
        if self.breakpoints.remove(addr) {
            debug!(address = %format_args!("{:#x}", addr), "移除断点");
            self.send(&GdbResponse::Ok);
        } else {
            self.send(&GdbResponse::Error);
        }
        true
    }

    /// 带外中断请求：清理断点并标记断开，但继续服务请求
    fn recv_intr(&mut self) -> bool {
        self.breakpoints.clear_all();
        self.flags.halt.store(0, Ordering::SeqCst);
        self.connected = false;
        true
    }

    /// `q`：通用查询，只支持`Rcmd`携带的监视命令
    fn generic_query<S>(&mut self, sim: &S, command: &str, extension: &str) -> bool
    where
        S: SimControl,
    {
        if command != "Rcmd" {
            return self.empty_action();
        }

        let (name, arg) = match extension.split_once(' ') {
            Some((name, arg)) => (name, arg.trim()),
            None => (extension, ""),
        };

        match name {
            "go" => match arg.parse::<f64>() {
                Ok(ns) if ns >= 0.0 => {
                    // 参数单位是纳秒，内部一律皮秒
                    self.time_to_go = (ns * 1e3) as u64;
                    self.send(&GdbResponse::Ok);
                }
                _ => self.reject_time_offset(),
            },
            "go_abs" => match arg.parse::<f64>() {
                Ok(ns) => {
                    let target_ps = ns * 1e3;
                    let now = sim.now_ps();
                    if target_ps < now as f64 {
                        self.reject_time_offset();
                    } else {
                        self.time_to_go = (target_ps - now as f64) as u64;
                        self.send(&GdbResponse::Ok);
                    }
                }
                Err(_) => self.reject_time_offset(),
            },
            "status" => {
                let mut message = format!("Current simulation time: {} (ps)\n", sim.now_ps());
                if self.time_to_go != 0 {
                    message.push_str(&format!(
                        "Simulating for : {} Nanoseconds\n",
                        self.time_to_go / 1000
                    ));
                }
                self.send(&GdbResponse::Output(message));
                self.send(&GdbResponse::Ok);
            }
            "time" => {
                let message = format!("Current simulation time: {} (ps)\n", sim.now_ps());
                self.send(&GdbResponse::Output(message));
                self.send(&GdbResponse::Ok);
            }
            "help" => {
                let message = concat!(
                    "Help about the custom GDB commands available for the simulation platform:\n",
                    "   monitor help:       prints the current message\n",
                    "   monitor time:       returns the current simulation time\n",
                    "   monitor status:     returns the status of the simulation\n",
                    "   monitor go n:       after the 'continue' command is given, it simulates for n (ns) starting from the current time\n",
                    "   monitor go_abs n:   after the 'continue' command is given, it simulates up to instant n (ns)\n",
                );
                self.send(&GdbResponse::Output(message.to_string()));
                self.send(&GdbResponse::Ok);
            }
            _ => {
                self.send(&GdbResponse::NotSupported);
            }
        }
        true
    }

    /// 拒绝非法的时间参数
    fn reject_time_offset(&mut self) {
        self.time_to_go = 0;
        self.send(&GdbResponse::Output(
            "Please specify a positive offset".to_string(),
        ));
        self.send(&GdbResponse::NotSupported);
    }
}

impl<W: IssueWidth> Default for GdbStub<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// 监听线程主循环
///
/// 逐字节读取套接字：模拟器运行期间收到的0x03转成停机标志，
/// 其余字节一律经通道转交给前台编解码器。
fn listen_loop(mut stream: TcpStream, tx: Sender<u8>, flags: Arc<SharedFlags>) {
    let mut buf = [0u8; 1];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                debug!("调试器关闭了连接");
                flags.conn_lost.store(true, Ordering::SeqCst);
                break;
            }
            Ok(_) => {
                let byte = buf[0];
                if byte == INTERRUPT_BYTE && !flags.dialog.load(Ordering::SeqCst) {
                    debug!("收到异步中断请求");
                    flags.interrupt();
                } else if tx.send(byte).is_err() {
                    // 接收端已销毁，调试桩不再存在
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "监听线程读取失败");
                flags.conn_lost.store(true, Ordering::SeqCst);
                break;
            }
        }
    }
}
