//! 断点管理
//!
//! 每条指令边界和每次内存访问都会查询断点表，查找必须是O(1)。

use std::collections::HashMap;

use nohash_hasher::BuildNoHashHasher;

use crate::abi::IssueWidth;

type NoHashHashMap<K, V> = HashMap<K, V, BuildNoHashHasher<K>>;

/// 断点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointKind {
    /// 硬件代码断点
    CodeHw,
    /// 软件代码断点
    CodeMem,
    /// 写观察点
    Write,
    /// 读观察点
    Read,
    /// 读写观察点
    Access,
}

impl BreakpointKind {
    /// 是否为代码断点（按PC命中）
    pub fn is_code(self) -> bool {
        matches!(self, BreakpointKind::CodeHw | BreakpointKind::CodeMem)
    }
}

/// 断点信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint<W: IssueWidth> {
    /// 断点类型
    pub kind: BreakpointKind,
    /// 断点地址
    pub address: W,
    /// 覆盖长度（目标字节），目前仅作记录
    pub length: usize,
}

/// 断点管理器
///
/// 各种类型的断点共用同一地址空间，每个地址最多一个断点。
#[derive(Debug)]
pub struct BreakpointManager<W: IssueWidth> {
    breakpoints: NoHashHashMap<W, Breakpoint<W>>,
}

impl<W: IssueWidth> BreakpointManager<W> {
    /// 创建新的断点管理器
    pub fn new() -> Self {
        Self {
            breakpoints: NoHashHashMap::default(),
        }
    }

    /// 添加断点，地址已被占用时返回false
    pub fn add(&mut self, kind: BreakpointKind, address: W, length: usize) -> bool {
        if self.breakpoints.contains_key(&address) {
            return false;
        }
        self.breakpoints.insert(
            address,
            Breakpoint {
                kind,
                address,
                length,
            },
        );
        true
    }

    /// 移除指定地址的断点
    pub fn remove(&mut self, address: W) -> bool {
        self.breakpoints.remove(&address).is_some()
    }

    /// 检查地址是否有断点
    #[inline(always)]
    pub fn has(&self, address: W) -> bool {
        self.breakpoints.contains_key(&address)
    }

    /// 获取指定地址的断点
    #[inline(always)]
    pub fn get(&self, address: W) -> Option<&Breakpoint<W>> {
        self.breakpoints.get(&address)
    }

    /// 清除所有断点
    pub fn clear_all(&mut self) {
        self.breakpoints.clear();
    }

    /// 当前断点数量
    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}

impl<W: IssueWidth> Default for BreakpointManager<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut mgr: BreakpointManager<u64> = BreakpointManager::new();
        assert!(mgr.add(BreakpointKind::CodeMem, 0x1000, 4));
        assert!(mgr.has(0x1000));
        assert!(!mgr.has(0x1004));

        let bp = mgr.get(0x1000).unwrap();
        assert_eq!(bp.kind, BreakpointKind::CodeMem);
        assert_eq!(bp.address, 0x1000);
        assert_eq!(bp.length, 4);
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let mut mgr: BreakpointManager<u64> = BreakpointManager::new();
        assert!(mgr.add(BreakpointKind::CodeHw, 0x2000, 4));
        // 第二次添加失败，第一个断点保持不变
        assert!(!mgr.add(BreakpointKind::Write, 0x2000, 8));
        assert_eq!(mgr.get(0x2000).unwrap().kind, BreakpointKind::CodeHw);
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut mgr: BreakpointManager<u64> = BreakpointManager::new();
        assert!(mgr.add(BreakpointKind::Read, 0x3000, 4));
        assert!(mgr.remove(0x3000));
        assert!(!mgr.has(0x3000));
        assert!(!mgr.remove(0x3000));

        // 移除后可以换类型重新添加
        assert!(mgr.add(BreakpointKind::Access, 0x3000, 4));
        assert_eq!(mgr.get(0x3000).unwrap().kind, BreakpointKind::Access);
    }

    #[test]
    fn test_clear_all() {
        let mut mgr: BreakpointManager<u32> = BreakpointManager::new();
        assert!(mgr.add(BreakpointKind::CodeMem, 0x100, 4));
        assert!(mgr.add(BreakpointKind::Write, 0x200, 4));
        assert_eq!(mgr.len(), 2);
        mgr.clear_all();
        assert!(mgr.is_empty());
        assert!(!mgr.has(0x100));
        assert!(!mgr.has(0x200));
    }

    #[test]
    fn test_add_remove_sequence() {
        let mut mgr: BreakpointManager<u64> = BreakpointManager::new();
        for addr in [0x10u64, 0x20, 0x30] {
            assert!(mgr.add(BreakpointKind::CodeMem, addr, 4));
        }
        assert!(mgr.remove(0x20));
        assert!(mgr.has(0x10));
        assert!(!mgr.has(0x20));
        assert!(mgr.has(0x30));
        assert_eq!(mgr.len(), 2);
    }
}
