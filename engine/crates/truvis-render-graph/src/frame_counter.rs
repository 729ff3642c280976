use crate::settings::{DefaultRendererSettings, FrameLabel};

/// 帧计数器，决定当前帧使用哪个 frame in flight slot
pub struct RgFrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
    /// frames in flight 的数量，范围 1..=3
    fif_count: usize,
}
// new & init
impl RgFrameCounter {
    pub fn new(init_frame_id: u64, fif_count: usize) -> Self {
        let clamped = fif_count.clamp(1, DefaultRendererSettings::MAX_FRAMES_IN_FLIGHT);
        if clamped != fif_count {
            log::warn!("frames in flight {fif_count} clamped to {clamped}");
        }
        Self {
            frame_id: init_frame_id,
            fif_count: clamped,
        }
    }
}
// update
impl RgFrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl RgFrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn fif_count(&self) -> usize {
        self.fif_count
    }
    #[inline]
    pub fn frame_index(&self) -> usize {
        (self.frame_id % self.fif_count as u64) as usize
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::ALL[self.frame_index()]
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_wraps_by_fif_count() {
        let mut counter = RgFrameCounter::new(0, 2);
        let labels: Vec<_> = (0..5)
            .map(|_| {
                let label = counter.frame_label();
                counter.next_frame();
                label
            })
            .collect();
        assert_eq!(labels, vec![FrameLabel::A, FrameLabel::B, FrameLabel::A, FrameLabel::B, FrameLabel::A]);
        assert_eq!(counter.frame_name(), "[F5B]");
    }

    #[test]
    fn test_fif_count_is_clamped() {
        assert_eq!(RgFrameCounter::new(0, 8).fif_count(), 3);
        assert_eq!(RgFrameCounter::new(0, 0).fif_count(), 1);
        assert_eq!(*FrameLabel::from_usize(2).unwrap(), 2);
        assert!(FrameLabel::from_usize(3).is_err());
    }
}
