//! GDB远程串行协议的线路编解码
//!
//! 报文格式为 `$<data>#<hh>`，`hh` 是载荷字节模256和的两位小写十六进制。
//! 入站在校验通过后先做游程展开再做转义还原；出站先转义再计算校验和。
//! 所有套接字读取都由监听线程完成，经通道转交给这里；写入只发生在
//! 模拟器线程持有对话权的时候。

use std::io::Write;
use std::net::TcpStream;
use std::sync::mpsc::Receiver;

use thiserror::Error;
use tracing::{error, warn};

use crate::abi::IssueWidth;
use crate::debugger::protocol::{GdbRequest, GdbResponse};

/// 带外中断字节
pub const INTERRUPT_BYTE: u8 = 0x03;

/// 校验和失败的重试上限，入站重读和出站重发共用
const RESEND_LIMIT: usize = 5;

/// 线路错误类型
#[derive(Debug, Error)]
pub enum WireError {
    #[error("连接已断开")]
    ConnectionLost,
    #[error("套接字错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("校验和连续失败，重试{0}次后放弃")]
    BadChecksum(usize),
}

/// 入站数据：一个完整报文，或一个带外中断
enum Inbound {
    Packet(Vec<u8>),
    Interrupt,
}

/// 调试器连接
///
/// 持有套接字的写端和监听线程转发字节的接收端。
pub struct GdbConnection {
    stream: TcpStream,
    rx: Receiver<u8>,
    /// 等待应答时收到的中断，延迟到下一次收包时交付
    pending_interrupt: bool,
}

impl GdbConnection {
    pub fn new(stream: TcpStream, rx: Receiver<u8>) -> Self {
        Self {
            stream,
            rx,
            pending_interrupt: false,
        }
    }

    /// 接收并解析下一条请求
    ///
    /// 线路错误不向上传播，统一映射为 `Error` 请求交给控制器善后。
    pub fn receive_request<W: IssueWidth>(&mut self, little_endian: bool) -> GdbRequest<W> {
        if self.pending_interrupt {
            self.pending_interrupt = false;
            return GdbRequest::Interrupt;
        }
        match self.read_inbound() {
            Ok(Inbound::Interrupt) => GdbRequest::Interrupt,
            Ok(Inbound::Packet(payload)) => GdbRequest::parse(&payload, little_endian),
            Err(e) => {
                error!(error = %e, "接收调试器请求失败");
                GdbRequest::Error
            }
        }
    }

    /// 发送一条响应并等待应答，收到否定应答时重发
    pub fn send_response(&mut self, response: &GdbResponse) -> Result<(), WireError> {
        let frame = frame_packet(&escape(&response.render()));
        for _ in 0..RESEND_LIMIT {
            self.stream.write_all(&frame)?;
            self.stream.flush()?;
            if self.wait_for_ack()? {
                return Ok(());
            }
            warn!("调试器否定应答，重发响应");
        }
        Err(WireError::BadChecksum(RESEND_LIMIT))
    }

    /// 向调试器发送裸的带外中断字节
    pub fn send_interrupt(&mut self) -> Result<(), WireError> {
        self.stream.write_all(&[INTERRUPT_BYTE])?;
        self.stream.flush()?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, WireError> {
        self.rx.recv().map_err(|_| WireError::ConnectionLost)
    }

    fn wait_for_ack(&mut self) -> Result<bool, WireError> {
        loop {
            match self.read_byte()? {
                b'+' => return Ok(true),
                b'-' => return Ok(false),
                INTERRUPT_BYTE => self.pending_interrupt = true,
                _ => {}
            }
        }
    }

    fn read_inbound(&mut self) -> Result<Inbound, WireError> {
        let mut failures = 0;
        loop {
            // 同步到报文起始
            loop {
                match self.read_byte()? {
                    b'$' => break,
                    INTERRUPT_BYTE => return Ok(Inbound::Interrupt),
                    _ => {}
                }
            }

            let mut raw = Vec::new();
            loop {
                match self.read_byte()? {
                    b'#' => break,
                    b => raw.push(b),
                }
            }
            let hi = self.read_byte()?;
            let lo = self.read_byte()?;

            let received = u8::from_str_radix(&String::from_utf8_lossy([hi, lo].as_ref()), 16);
            if received == Ok(checksum(&raw)) {
                self.stream.write_all(b"+")?;
                self.stream.flush()?;
                return Ok(Inbound::Packet(decode_payload(&raw)));
            }

            warn!(failures, "报文校验和不匹配，请求重发");
            self.stream.write_all(b"-")?;
            self.stream.flush()?;
            failures += 1;
            if failures >= RESEND_LIMIT {
                return Err(WireError::BadChecksum(failures));
            }
        }
    }
}

/// 载荷字节的模256和
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// 组装 `$<data>#<hh>` 报文帧
pub fn frame_packet(escaped: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(escaped.len() + 4);
    frame.push(b'$');
    frame.extend_from_slice(escaped);
    frame.push(b'#');
    frame.extend_from_slice(&crate::debugger::protocol::hex_encode(&[checksum(escaped)]));
    frame
}

/// 转义载荷中的特殊字节
pub fn escape(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    for &b in payload {
        if matches!(b, b'$' | b'#' | b'}' | b'*') {
            out.push(b'}');
            out.push(b ^ 0x20);
        } else {
            out.push(b);
        }
    }
    out
}

/// 入站载荷解码：游程展开后做转义还原
pub fn decode_payload(raw: &[u8]) -> Vec<u8> {
    unescape(&expand_run_length(raw))
}

/// 展开游程压缩：`X*n` 表示前一个字符再重复 n-28 次
fn expand_run_length(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'*' && i + 1 < data.len() {
            if let Some(&prev) = out.last() {
                let count = data[i + 1].saturating_sub(28) as usize;
                out.extend(std::iter::repeat(prev).take(count));
                i += 2;
                continue;
            }
        }
        out.push(data[i]);
        i += 1;
    }
    out
}

/// 还原 `}` 转义
fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'}' && i + 1 < data.len() {
            out.push(data[i + 1] ^ 0x20);
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(b""), 0);
        assert_eq!(checksum(b"OK"), 0x9a);
        assert_eq!(checksum(b"S05"), 0xb8);
        assert_eq!(checksum(b"?"), 0x3f);
        // 模256回绕
        assert_eq!(checksum(&[0xff, 0x02]), 0x01);
    }

    #[test]
    fn test_frame_packet() {
        assert_eq!(frame_packet(b"OK"), b"$OK#9a".to_vec());
        assert_eq!(frame_packet(b""), b"$#00".to_vec());
    }

    #[test]
    fn test_escape_roundtrip() {
        let data = [b'$', b'#', b'}', b'*', b'a', 0x00, 0xff];
        let escaped = escape(&data);
        // 四个特殊字节各多出一个转义前缀
        assert_eq!(escaped.len(), data.len() + 4);
        // 转义后的载荷不会破坏报文分帧
        assert_eq!(
            escaped
                .iter()
                .filter(|&&b| matches!(b, b'$' | b'#' | b'*'))
                .count(),
            0
        );
        assert_eq!(unescape(&escaped), data.to_vec());
    }

    #[test]
    fn test_decode_payload_roundtrip() {
        // 任意字节序列经转义编码后能完整还原
        let cases: [&[u8]; 4] = [b"", b"plain", &[b'}', b'$', b'#', b'*'], &[0x03, 0x7d, 0x24]];
        for data in cases {
            assert_eq!(decode_payload(&escape(data)), data.to_vec());
        }
    }

    #[test]
    fn test_expand_run_length() {
        // 计数字符减28是额外重复的次数
        let expanded = expand_run_length(b"X*!");
        let expect = b'!'.wrapping_sub(28) as usize + 1;
        assert_eq!(expanded.len(), expect);
        assert!(expanded.iter().all(|&b| b == b'X'));

        assert_eq!(expand_run_length(b"ab"), b"ab".to_vec());
        // 孤立的'*'保持原样
        assert_eq!(expand_run_length(b"*x"), b"*x".to_vec());
    }

    #[test]
    fn test_corruption_detected() {
        let frame = frame_packet(b"memory-payload");
        // 载荷中任意单比特篡改都会使校验失败
        for i in 1..frame.len() - 3 {
            for bit in 0..8 {
                let mut bad = frame.clone();
                bad[i] ^= 1 << bit;
                let payload = &bad[1..bad.len() - 3];
                let digits = &bad[bad.len() - 2..];
                let parsed =
                    u8::from_str_radix(std::str::from_utf8(digits).unwrap(), 16).unwrap();
                assert_ne!(checksum(payload), parsed);
            }
        }
    }
}
