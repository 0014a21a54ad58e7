//! GDB远程串行协议的请求与响应模型
//!
//! 报文载荷解析成类型化的请求，结构化的响应渲染回载荷字节。
//! 寄存器和内存载荷按目标字节序编码，每字节两个小写十六进制字符。

use crate::abi::IssueWidth;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// 解析后的调试器请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GdbRequest<W: IssueWidth> {
    /// `?` 查询停止原因
    StopReason,
    /// `!` 扩展模式查询
    ExtendedMode,
    /// `c` 继续执行
    Continue { addr: Option<W> },
    /// `C` 带信号继续，不支持
    ContinueWithSignal,
    /// `D` 断开连接
    Detach,
    /// `g` 读取全部寄存器
    ReadRegisters,
    /// `G` 写入全部寄存器
    WriteRegisters { values: Vec<W> },
    /// `H` 线程选择，不支持
    SetThread,
    /// `i` 单周期步进，不支持
    CycleStep,
    /// `I` 带信号单周期步进，不支持
    CycleStepWithSignal,
    /// `k` 结束模拟
    Kill,
    /// `m` 读取内存
    ReadMemory { addr: W, length: usize },
    /// `M`/`X` 写入内存
    WriteMemory {
        addr: W,
        length: usize,
        data: Vec<u8>,
    },
    /// `p` 读取单个寄存器
    ReadRegister { index: usize },
    /// `P` 写入单个寄存器
    WriteRegister { index: usize, value: W },
    /// `q` 通用查询，`Rcmd` 的参数已经过十六进制解码
    Query { command: String, extension: String },
    /// `s` 单步执行
    Step { addr: Option<W> },
    /// `S` 带信号单步，不支持
    StepWithSignal,
    /// `t` 反向搜索，不支持
    BackwardSearch,
    /// `T` 线程存活查询，不支持
    ThreadAlive,
    /// `z` 移除断点
    RemoveBreakpoint { addr: W },
    /// `Z` 添加断点
    AddBreakpoint {
        type_code: u32,
        addr: W,
        length: usize,
    },
    /// 带外的0x03中断字节
    Interrupt,
    /// 连接错误
    Error,
    /// 无法识别或格式错误的报文
    Unknown,
}

impl<W: IssueWidth> GdbRequest<W> {
    /// 解析一条报文载荷
    ///
    /// `P` 的寄存器值和 `G` 的载荷按目标字节序解码，其余字段是
    /// 普通的大端十六进制数。格式错误统一归入 `Unknown`。
    pub fn parse(payload: &[u8], little_endian: bool) -> Self {
        let Some((&letter, body)) = payload.split_first() else {
            return GdbRequest::Unknown;
        };

        match letter {
            b'?' => GdbRequest::StopReason,
            b'!' => GdbRequest::ExtendedMode,
            b'c' => match parse_optional_addr(body) {
                Some(addr) => GdbRequest::Continue { addr },
                None => GdbRequest::Unknown,
            },
            b'C' => GdbRequest::ContinueWithSignal,
            b'D' => GdbRequest::Detach,
            b'g' => GdbRequest::ReadRegisters,
            b'G' => match hex_decode(body) {
                Some(bytes) => GdbRequest::WriteRegisters {
                    values: bytes_to_values(&bytes, little_endian),
                },
                None => GdbRequest::Unknown,
            },
            b'H' => GdbRequest::SetThread,
            b'i' => GdbRequest::CycleStep,
            b'I' => GdbRequest::CycleStepWithSignal,
            b'k' => GdbRequest::Kill,
            b'm' => match parse_addr_length(body) {
                Some((addr, length)) => GdbRequest::ReadMemory { addr, length },
                None => GdbRequest::Unknown,
            },
            b'M' => parse_write_memory(body, true),
            b'X' => parse_write_memory(body, false),
            b'p' => match parse_hex_u64(body) {
                Some(index) => GdbRequest::ReadRegister {
                    index: index as usize,
                },
                None => GdbRequest::Unknown,
            },
            b'P' => parse_write_register(body, little_endian),
            b'q' => parse_query(body),
            b's' => match parse_optional_addr(body) {
                Some(addr) => GdbRequest::Step { addr },
                None => GdbRequest::Unknown,
            },
            b'S' => GdbRequest::StepWithSignal,
            b't' => GdbRequest::BackwardSearch,
            b'T' => GdbRequest::ThreadAlive,
            b'z' => match parse_breakpoint(body) {
                Some((_, addr, _)) => GdbRequest::RemoveBreakpoint { addr },
                None => GdbRequest::Unknown,
            },
            b'Z' => match parse_breakpoint(body) {
                Some((type_code, addr, length)) => GdbRequest::AddBreakpoint {
                    type_code,
                    addr,
                    length,
                },
                None => GdbRequest::Unknown,
            },
            _ => GdbRequest::Unknown,
        }
    }
}

/// 发往调试器的响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GdbResponse {
    /// `OK`
    Ok,
    /// 空载荷，表示不支持该请求
    NotSupported,
    /// `E00`
    Error,
    /// 寄存器内容，发送时十六进制编码
    RegRead(Vec<u8>),
    /// 内存内容，发送时十六进制编码
    MemRead(Vec<u8>),
    /// `S` 停止报文
    Stop { signal: u8 },
    /// `T` 停止报文，附带 `key:value;` 信息对
    StopWithInfo {
        signal: u8,
        info: Vec<(String, String)>,
    },
    /// `W` 退出报文
    Exit { signal: u8 },
    /// `O` 控制台文本输出
    Output(String),
}

impl GdbResponse {
    /// 渲染为报文载荷（未分帧、未转义）
    pub fn render(&self) -> Vec<u8> {
        match self {
            GdbResponse::Ok => b"OK".to_vec(),
            GdbResponse::NotSupported => Vec::new(),
            GdbResponse::Error => b"E00".to_vec(),
            GdbResponse::RegRead(bytes) | GdbResponse::MemRead(bytes) => hex_encode(bytes),
            GdbResponse::Stop { signal } => format!("S{:02x}", signal).into_bytes(),
            GdbResponse::StopWithInfo { signal, info } => {
                let mut out = format!("T{:02x}", signal);
                for (key, value) in info {
                    out.push_str(key);
                    out.push(':');
                    out.push_str(value);
                    out.push(';');
                }
                out.into_bytes()
            }
            GdbResponse::Exit { signal } => format!("W{:02x}", signal).into_bytes(),
            GdbResponse::Output(text) => {
                let mut out = vec![b'O'];
                out.extend_from_slice(&hex_encode(text.as_bytes()));
                out
            }
        }
    }
}

/// 把目标字拆成目标字节序的字节序列
pub fn value_to_bytes<W: IssueWidth>(value: W, little_endian: bool) -> Vec<u8> {
    let raw = value.to_u64();
    let mut bytes = Vec::with_capacity(W::BYTES);
    if little_endian {
        for i in 0..W::BYTES {
            bytes.push((raw >> (8 * i)) as u8);
        }
    } else {
        for i in (0..W::BYTES).rev() {
            bytes.push((raw >> (8 * i)) as u8);
        }
    }
    bytes
}

/// 按目标字节序把字节序列组装回目标字
pub fn bytes_to_value<W: IssueWidth>(bytes: &[u8], little_endian: bool) -> W {
    let mut raw: u64 = 0;
    if little_endian {
        for (i, &b) in bytes.iter().take(W::BYTES).enumerate() {
            raw |= (b as u64) << (8 * i);
        }
    } else {
        for &b in bytes.iter().take(W::BYTES) {
            raw = (raw << 8) | b as u64;
        }
    }
    W::from_u64(raw)
}

/// 把连续的字节载荷拆成目标字序列，尾部不足一个字的字节丢弃
pub fn bytes_to_values<W: IssueWidth>(bytes: &[u8], little_endian: bool) -> Vec<W> {
    bytes
        .chunks_exact(W::BYTES)
        .map(|chunk| bytes_to_value(chunk, little_endian))
        .collect()
}

/// 小写十六进制编码
pub fn hex_encode(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize]);
        out.push(HEX_DIGITS[(b & 0xf) as usize]);
    }
    out
}

/// 十六进制解码，长度必须为偶数
pub fn hex_decode(hex: &[u8]) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    for pair in hex.chunks_exact(2) {
        let hi = from_hex_digit(pair[0])?;
        let lo = from_hex_digit(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Some(out)
}

/// 解析大端十六进制数
pub fn parse_hex_u64(hex: &[u8]) -> Option<u64> {
    if hex.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for &b in hex {
        let digit = from_hex_digit(b)? as u64;
        value = value.checked_mul(16)?.checked_add(digit)?;
    }
    Some(value)
}

fn from_hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(10 + b - b'a'),
        b'A'..=b'F' => Some(10 + b - b'A'),
        _ => None,
    }
}

/// `c`/`s` 的可选地址参数：空载荷是合法的"无地址"
fn parse_optional_addr<W: IssueWidth>(body: &[u8]) -> Option<Option<W>> {
    if body.is_empty() {
        return Some(None);
    }
    parse_hex_u64(body).map(|addr| Some(W::from_u64(addr)))
}

fn parse_addr_length<W: IssueWidth>(body: &[u8]) -> Option<(W, usize)> {
    let comma = body.iter().position(|&b| b == b',')?;
    let addr = parse_hex_u64(&body[..comma])?;
    let length = parse_hex_u64(&body[comma + 1..])?;
    Some((W::from_u64(addr), length as usize))
}

fn parse_write_memory<W: IssueWidth>(body: &[u8], hex_data: bool) -> GdbRequest<W> {
    let Some(colon) = body.iter().position(|&b| b == b':') else {
        return GdbRequest::Unknown;
    };
    let Some((addr, length)) = parse_addr_length(&body[..colon]) else {
        return GdbRequest::Unknown;
    };
    let raw = &body[colon + 1..];
    let data = if hex_data {
        match hex_decode(raw) {
            Some(bytes) => bytes,
            None => return GdbRequest::Unknown,
        }
    } else {
        raw.to_vec()
    };
    GdbRequest::WriteMemory { addr, length, data }
}

fn parse_write_register<W: IssueWidth>(body: &[u8], little_endian: bool) -> GdbRequest<W> {
    let Some(eq) = body.iter().position(|&b| b == b'=') else {
        return GdbRequest::Unknown;
    };
    let Some(index) = parse_hex_u64(&body[..eq]) else {
        return GdbRequest::Unknown;
    };
    let Some(bytes) = hex_decode(&body[eq + 1..]) else {
        return GdbRequest::Unknown;
    };
    GdbRequest::WriteRegister {
        index: index as usize,
        value: bytes_to_value(&bytes, little_endian),
    }
}

fn parse_breakpoint<W: IssueWidth>(body: &[u8]) -> Option<(u32, W, usize)> {
    let mut fields = body.split(|&b| b == b',');
    let type_code = parse_hex_u64(fields.next()?)? as u32;
    let addr = parse_hex_u64(fields.next()?)?;
    let length = parse_hex_u64(fields.next()?)? as usize;
    Some((type_code, W::from_u64(addr), length))
}

fn parse_query<W: IssueWidth>(body: &[u8]) -> GdbRequest<W> {
    let split = body.iter().position(|&b| b == b',' || b == b':');
    let (name, rest) = match split {
        Some(pos) => (&body[..pos], &body[pos + 1..]),
        None => (body, &body[body.len()..]),
    };
    let Ok(command) = String::from_utf8(name.to_vec()) else {
        return GdbRequest::Unknown;
    };

    // Rcmd的参数是十六进制编码的命令行文本
    let extension = if command == "Rcmd" {
        let Some(decoded) = hex_decode(rest) else {
            return GdbRequest::Unknown;
        };
        match String::from_utf8(decoded) {
            Ok(text) => text,
            Err(_) => return GdbRequest::Unknown,
        }
    } else {
        String::from_utf8_lossy(rest).into_owned()
    };

    GdbRequest::Query { command, extension }
}
