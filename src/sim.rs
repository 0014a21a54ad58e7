//! 模拟器协作接口
//!
//! 调试桩不拥有模拟器内核，只依赖虚拟时钟、定时暂停事件和停止请求
//! 三个能力。时间单位统一为皮秒。

/// 定时暂停事件的回调类型
pub type PauseCallback = Box<dyn FnOnce() + Send>;

/// 模拟器控制接口
///
/// `schedule_after` 是单槽定时器：重新调度会取代尚未触发的旧回调。
/// 回调在模拟器的事件队列中触发，只写调试桩的共享停机标志。
pub trait SimControl {
    /// 当前虚拟时间（皮秒）
    fn now_ps(&self) -> u64;

    /// 在 `delay_ps` 皮秒后触发回调
    fn schedule_after(&mut self, delay_ps: u64, callback: PauseCallback);

    /// 请求结束整个模拟
    fn stop(&mut self);
}
