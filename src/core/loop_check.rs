//! Loop gate between the frame source and the renderer
//!
//! The media element repeats natively whenever more than one cycle is
//! configured, so it never reports "ended" on its own. The checker counts
//! completed cycles from the frame indices and is the only source of the end
//! decision in that case.
//!
//! A cycle completes when the last frame of the cycle is seen (frame count
//! known) or when the index wraps back (frame count unknown, or the tail frame
//! was dropped by the frame source). A wrap is a backward jump over at least
//! half the cycle; shorter backward steps are re-delivered frames and count
//! nothing. In a one-frame cycle every repeat of frame 0 starts a new cycle.

use log::{debug, trace};

use crate::config::LoopCount;
use crate::core::traits::Frame;

/// Result of gating one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopDecision {
    /// Hand the frame to the renderer
    pub forward: bool,
    /// Playback is logically complete (reported once)
    pub ended: bool,
}

impl LoopDecision {
    const FORWARD: LoopDecision = LoopDecision { forward: true, ended: false };
    const DROP: LoopDecision = LoopDecision { forward: false, ended: false };
}

#[derive(Debug, Clone)]
pub struct LoopChecker {
    loop_count: LoopCount,
    total_frames: Option<u32>,
    last_index: Option<u32>,
    cycles_completed: u32,
    /// Current cycle already counted via its tail frame
    tail_counted: bool,
    ended: bool,
}

impl LoopChecker {
    pub fn new(loop_count: LoopCount) -> Self {
        Self {
            loop_count,
            total_frames: None,
            last_index: None,
            cycles_completed: 0,
            tail_counted: false,
            ended: false,
        }
    }

    /// Native loop flag for the media element
    pub fn is_repeating(&self) -> bool {
        self.loop_count.is_repeating()
    }

    /// Frames per cycle, once known (metadata or duration * fps)
    pub fn set_total_frames(&mut self, total: Option<u32>) {
        self.total_frames = total.filter(|t| *t > 0);
        debug!("LoopChecker: total_frames={:?}, loop={:?}", self.total_frames, self.loop_count);
    }

    pub fn total_frames(&self) -> Option<u32> {
        self.total_frames
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    fn target_reached(&self) -> bool {
        match self.loop_count.cycles() {
            Some(n) => self.cycles_completed >= n,
            None => false,
        }
    }

    /// Gate one frame
    pub fn update_frame(&mut self, frame: &Frame) -> LoopDecision {
        if self.ended {
            return LoopDecision::DROP;
        }

        if let Some(total) = self.total_frames
            && frame.index >= total
        {
            trace!("LoopChecker: frame {} out of range (total {})", frame.index, total);
            return LoopDecision::DROP;
        }

        if let Some(last) = self.last_index
            && self.starts_new_cycle(last, frame.index)
        {
            if self.tail_counted {
                self.tail_counted = false;
            } else {
                self.cycles_completed += 1;
                trace!("LoopChecker: wrap {} -> {}, cycles={}", last, frame.index, self.cycles_completed);
            }
            if self.target_reached() {
                self.last_index = Some(frame.index);
                return self.finish();
            }
        }
        self.last_index = Some(frame.index);

        if let Some(total) = self.total_frames
            && frame.index + 1 >= total
            && !self.tail_counted
        {
            self.tail_counted = true;
            self.cycles_completed += 1;
            trace!("LoopChecker: tail frame {}, cycles={}", frame.index, self.cycles_completed);
            if self.target_reached() {
                let decision = self.finish();
                return LoopDecision { forward: true, ..decision };
            }
        }

        LoopDecision::FORWARD
    }

    fn starts_new_cycle(&self, last: u32, index: u32) -> bool {
        match self.total_frames {
            Some(1) => true,
            Some(total) => index < last && last - index >= total.div_ceil(2),
            None => index < last && last - index >= (last + 1).div_ceil(2),
        }
    }

    fn finish(&mut self) -> LoopDecision {
        self.ended = true;
        debug!("LoopChecker: ended after {} cycles", self.cycles_completed);
        LoopDecision { forward: false, ended: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u32) -> Frame {
        Frame::new(index, index as f64 / 25.0)
    }

    fn run(checker: &mut LoopChecker, indices: impl IntoIterator<Item = u32>) -> Vec<LoopDecision> {
        indices.into_iter().map(|i| checker.update_frame(&frame(i))).collect()
    }

    #[test]
    fn test_play_once_ends_on_tail_frame() {
        for count in [0, 1] {
            let mut checker = LoopChecker::new(LoopCount::from_count(count));
            checker.set_total_frames(Some(10));
            assert!(!checker.is_repeating());

            let decisions = run(&mut checker, 0..10);
            assert!(decisions[..9].iter().all(|d| d.forward && !d.ended));
            assert_eq!(decisions[9], LoopDecision { forward: true, ended: true });
            assert_eq!(checker.cycles_completed(), 1);
        }
    }

    #[test]
    fn test_play_once_without_total_ends_on_wrap() {
        let mut checker = LoopChecker::new(LoopCount::Once);
        let decisions = run(&mut checker, (0..8).chain([0]));
        assert!(decisions[..8].iter().all(|d| d.forward && !d.ended));
        assert_eq!(decisions[8], LoopDecision { forward: false, ended: true });
    }

    #[test]
    fn test_repeat_ends_only_after_n_cycles() {
        for n in 2..=4u32 {
            let mut checker = LoopChecker::new(LoopCount::Times(n));
            checker.set_total_frames(Some(5));
            assert!(checker.is_repeating());

            let mut ended_at = None;
            for (i, idx) in (0..n * 5).map(|k| k % 5).enumerate() {
                let d = checker.update_frame(&frame(idx));
                if d.ended {
                    assert!(ended_at.is_none(), "ended reported twice");
                    ended_at = Some(i);
                }
            }
            assert_eq!(ended_at, Some((n * 5 - 1) as usize));
            assert_eq!(checker.cycles_completed(), n);
        }
    }

    #[test]
    fn test_repeat_counts_wraps_without_total() {
        let mut checker = LoopChecker::new(LoopCount::Times(3));
        // three cycles of 0..4, the third completes when the fourth would start
        let decisions = run(&mut checker, (0..4).chain(0..4).chain(0..4).chain([0]));
        let ended: Vec<usize> = decisions.iter().enumerate().filter(|(_, d)| d.ended).map(|(i, _)| i).collect();
        assert_eq!(ended, vec![12]);
        assert!(!decisions[12].forward);
    }

    #[test]
    fn test_infinite_never_ends() {
        let mut checker = LoopChecker::new(LoopCount::Infinite);
        checker.set_total_frames(Some(3));
        let decisions = run(&mut checker, (0..300).map(|i| i % 3));
        assert!(decisions.iter().all(|d| d.forward && !d.ended));
        assert_eq!(checker.cycles_completed(), 100);
    }

    #[test]
    fn test_out_of_range_frame_dropped() {
        let mut checker = LoopChecker::new(LoopCount::Times(2));
        checker.set_total_frames(Some(4));
        assert_eq!(checker.update_frame(&frame(1)), LoopDecision::FORWARD);
        assert_eq!(checker.update_frame(&frame(7)), LoopDecision::DROP);
        // dropped frame does not disturb wrap detection
        assert_eq!(checker.update_frame(&frame(2)), LoopDecision::FORWARD);
        assert_eq!(checker.cycles_completed(), 0);
    }

    #[test]
    fn test_tail_then_wrap_counts_once() {
        let mut checker = LoopChecker::new(LoopCount::Times(2));
        checker.set_total_frames(Some(3));
        run(&mut checker, [0, 1, 2, 2, 0, 1]);
        assert_eq!(checker.cycles_completed(), 1);
        assert!(!checker.is_ended());
    }

    #[test]
    fn test_frames_after_end_are_dropped() {
        let mut checker = LoopChecker::new(LoopCount::Once);
        checker.set_total_frames(Some(2));
        run(&mut checker, [0, 1]);
        assert!(checker.is_ended());
        assert_eq!(checker.update_frame(&frame(0)), LoopDecision::DROP);
        assert_eq!(checker.update_frame(&frame(1)), LoopDecision::DROP);
    }

    #[test]
    fn test_single_frame_cycle_counts_every_repeat() {
        let mut checker = LoopChecker::new(LoopCount::Times(3));
        checker.set_total_frames(Some(1));
        let decisions = run(&mut checker, std::iter::repeat_n(0, 50));
        let ended: Vec<usize> = decisions.iter().enumerate().filter(|(_, d)| d.ended).map(|(i, _)| i).collect();
        assert_eq!(ended, vec![2]);
        assert_eq!(checker.cycles_completed(), 3);

        let mut once = LoopChecker::new(LoopCount::Once);
        once.set_total_frames(Some(1));
        assert_eq!(once.update_frame(&frame(0)), LoopDecision { forward: true, ended: true });
    }

    #[test]
    fn test_redelivered_frame_is_not_a_wrap() {
        let mut checker = LoopChecker::new(LoopCount::Times(2));
        checker.set_total_frames(Some(10));
        run(&mut checker, [0, 1, 2, 3, 4, 5, 6, 5, 7, 8]);
        assert_eq!(checker.cycles_completed(), 0);

        let mut unknown = LoopChecker::new(LoopCount::Times(2));
        run(&mut unknown, [0, 1, 2, 3, 4, 5, 6, 5, 7]);
        assert_eq!(unknown.cycles_completed(), 0);
        // a real wrap still counts
        run(&mut unknown, [0]);
        assert_eq!(unknown.cycles_completed(), 1);
    }
}
