//! 处理器ABI接口
//!
//! 调试桩通过该接口访问处理器的体系结构状态（寄存器、内存、PC），
//! 不依赖任何具体的指令集实现。模拟器暂停时才会调用这些方法。

use std::fmt;
use std::hash::Hash;

use nohash_hasher::IsEnabled;
use thiserror::Error;

/// ABI访问错误类型
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("寄存器访问错误: GDB寄存器 {0} 超出范围")]
    InvalidRegister(usize),
    #[error("内存访问错误: 地址 {0:#x} 不可访问")]
    InvalidAddress(u64),
    #[error("ABI错误: {0}")]
    Other(String),
}

/// 目标字宽类型
///
/// 寄存器值和地址共用同一个字类型，在实例化调试桩时选定。
pub trait IssueWidth:
    Copy + Eq + Hash + IsEnabled + fmt::Debug + fmt::LowerHex + Send + 'static
{
    /// 目标字节数
    const BYTES: usize;

    fn zero() -> Self;
    /// 截断转换
    fn from_u64(value: u64) -> Self;
    fn to_u64(self) -> u64;
}

impl IssueWidth for u32 {
    const BYTES: usize = 4;

    fn zero() -> Self {
        0
    }

    fn from_u64(value: u64) -> Self {
        value as u32
    }

    fn to_u64(self) -> u64 {
        self as u64
    }
}

impl IssueWidth for u64 {
    const BYTES: usize = 8;

    fn zero() -> Self {
        0
    }

    fn from_u64(value: u64) -> Self {
        value
    }

    fn to_u64(self) -> u64 {
        self
    }
}

/// 处理器ABI
///
/// 读取失败时调试桩以0填充响应，写入失败时向调试器返回错误响应，
/// 两类错误都不会传播到模拟器。
pub trait ProcessorAbi {
    type Word: IssueWidth;

    /// 目标是否为小端
    fn is_little_endian(&self) -> bool;

    /// GDB可见的寄存器数量
    fn gdb_reg_count(&self) -> usize;

    /// 按GDB编号读取寄存器
    fn read_gdb_reg(&self, index: usize) -> Result<Self::Word, AbiError>;

    /// 按GDB编号写入寄存器
    fn write_gdb_reg(&mut self, index: usize, value: Self::Word) -> Result<(), AbiError>;

    /// 读取一个内存字节
    fn read_mem_byte(&self, addr: Self::Word) -> Result<u8, AbiError>;

    /// 写入一个内存字节
    fn write_mem_byte(&mut self, addr: Self::Word, byte: u8) -> Result<(), AbiError>;

    /// 设置程序计数器
    fn set_pc(&mut self, value: Self::Word);
}
