//! Post-codegen peephole optimization
//!
//! Rules see fixed-size windows of already-emitted instructions. Each
//! function body is cut into straight-line segments at labels, branches,
//! calls and returns, and a window never spans two segments, so nothing
//! moves across a control-flow boundary.

use crate::asm::{AsmInst, Reg};
use crate::emit::AsmProgram;
use log::{debug, info};

pub trait PeepholeRule {
    fn name(&self) -> &'static str;
    fn window(&self) -> usize;
    /// Replacement for `window`, or `None` when the rule does not apply
    fn apply(&self, window: &[AsmInst]) -> Option<Vec<AsmInst>>;
}

/// `mov a, a`
pub struct RemoveSelfMove;

impl PeepholeRule for RemoveSelfMove {
    fn name(&self) -> &'static str {
        "remove-self-move"
    }

    fn window(&self) -> usize {
        1
    }

    fn apply(&self, window: &[AsmInst]) -> Option<Vec<AsmInst>> {
        match window {
            [AsmInst::Mov(a, b)] if a == b => Some(Vec::new()),
            _ => None,
        }
    }
}

/// `stur a, [x29, #o]; ldur b, [x29, #o]` reads back what was just stored
pub struct ForwardStoreToLoad;

impl PeepholeRule for ForwardStoreToLoad {
    fn name(&self) -> &'static str {
        "forward-store-to-load"
    }

    fn window(&self) -> usize {
        2
    }

    fn apply(&self, window: &[AsmInst]) -> Option<Vec<AsmInst>> {
        match window {
            [store @ AsmInst::Stur(a, sb, so), AsmInst::Ldur(b, lb, lo)] if sb == lb && so == lo && *sb == Reg::FP => {
                let mut out = vec![store.clone()];
                if a != b {
                    out.push(AsmInst::Mov(*b, *a));
                }
                Some(out)
            }
            _ => None,
        }
    }
}

/// `mov a, b; mov b, a`: the second move changes nothing
pub struct DropMoveBack;

impl PeepholeRule for DropMoveBack {
    fn name(&self) -> &'static str {
        "drop-move-back"
    }

    fn window(&self) -> usize {
        2
    }

    fn apply(&self, window: &[AsmInst]) -> Option<Vec<AsmInst>> {
        match window {
            [first @ AsmInst::Mov(a, b), AsmInst::Mov(c, d)] if c == b && d == a => Some(vec![first.clone()]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeepholeStats {
    pub instructions_before: usize,
    pub instructions_after: usize,
    /// `(rule, rewrites)` in rule order; the branch rule is listed last
    pub rule_hits: Vec<(String, usize)>,
}

impl PeepholeStats {
    pub fn hits_for(&self, rule: &str) -> usize {
        self.rule_hits.iter().find(|(name, _)| name == rule).map_or(0, |(_, n)| *n)
    }
}

const JUMP_TO_NEXT: &str = "remove-jump-to-next";

pub struct PostOptimizer {
    rules: Vec<Box<dyn PeepholeRule>>,
}

impl Default for PostOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PostOptimizer {
    pub fn new() -> Self {
        Self::with_rules(vec![Box::new(RemoveSelfMove), Box::new(ForwardStoreToLoad), Box::new(DropMoveBack)])
    }

    pub fn with_rules(rules: Vec<Box<dyn PeepholeRule>>) -> Self {
        Self { rules }
    }

    pub fn optimize(&self, program: &mut AsmProgram) -> PeepholeStats {
        let mut hits = vec![0usize; self.rules.len()];
        let mut jumps_removed = 0;
        let before = program.instruction_count();

        for function in &mut program.functions {
            let body = std::mem::take(&mut function.body);
            let (body, removed) = remove_jumps_to_next(body);
            jumps_removed += removed;
            function.body = self.optimize_body(body, &mut hits);
        }

        let mut rule_hits: Vec<(String, usize)> =
            self.rules.iter().zip(&hits).map(|(r, n)| (r.name().to_string(), *n)).collect();
        rule_hits.push((JUMP_TO_NEXT.to_string(), jumps_removed));

        let stats = PeepholeStats {
            instructions_before: before,
            instructions_after: program.instruction_count(),
            rule_hits,
        };
        info!(
            "Peephole: {} -> {} instruction(s)",
            stats.instructions_before, stats.instructions_after
        );
        stats
    }

    fn optimize_body(&self, body: Vec<AsmInst>, hits: &mut [usize]) -> Vec<AsmInst> {
        let mut out = Vec::with_capacity(body.len());
        let mut segment = Vec::new();

        for inst in body {
            if inst.is_boundary() {
                out.extend(self.optimize_segment(std::mem::take(&mut segment), hits));
                out.push(inst);
            } else {
                segment.push(inst);
            }
        }
        out.extend(self.optimize_segment(segment, hits));
        out
    }

    /// Apply rules until none fires
    fn optimize_segment(&self, mut segment: Vec<AsmInst>, hits: &mut [usize]) -> Vec<AsmInst> {
        let limit = 2 * segment.len() + 1;
        for _ in 0..limit {
            let mut changed = false;
            for (rule_index, rule) in self.rules.iter().enumerate() {
                let width = rule.window();
                let mut i = 0;
                while width > 0 && i + width <= segment.len() {
                    match rule.apply(&segment[i..i + width]) {
                        Some(replacement) if replacement[..] != segment[i..i + width] => {
                            debug!("{} rewrote {} instruction(s) at {}", rule.name(), width, i);
                            let emitted = replacement.len();
                            segment.splice(i..i + width, replacement);
                            hits[rule_index] += 1;
                            changed = true;
                            i += emitted.max(1);
                        }
                        _ => i += 1,
                    }
                }
            }
            if !changed {
                break;
            }
        }
        segment
    }
}

/// `b L` immediately followed by `L:`
fn remove_jumps_to_next(body: Vec<AsmInst>) -> (Vec<AsmInst>, usize) {
    let mut out: Vec<AsmInst> = Vec::with_capacity(body.len());
    let mut removed = 0;
    let mut iter = body.into_iter().peekable();

    while let Some(inst) = iter.next() {
        if let (AsmInst::B(target), Some(AsmInst::Label(next))) = (&inst, iter.peek()) {
            if target == next {
                removed += 1;
                continue;
            }
        }
        out.push(inst);
    }
    (out, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::AsmFunction;
    use pretty_assertions::assert_eq;

    fn program(body: Vec<AsmInst>) -> AsmProgram {
        AsmProgram {
            functions: vec![AsmFunction { name: "main".into(), frame_size: 0, is_leaf: true, body }],
            ..AsmProgram::default()
        }
    }

    fn render(program: &AsmProgram) -> Vec<String> {
        program.functions[0].body.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_self_move_is_removed() {
        let mut p = program(vec![AsmInst::Mov(Reg::X(19), Reg::X(19)), AsmInst::Ret]);
        let stats = PostOptimizer::new().optimize(&mut p);

        assert_eq!(render(&p), vec!["ret"]);
        assert_eq!(stats.instructions_before, 2);
        assert_eq!(stats.instructions_after, 1);
        assert_eq!(stats.hits_for("remove-self-move"), 1);
    }

    #[test]
    fn test_store_is_forwarded_to_load() {
        let mut p = program(vec![
            AsmInst::Stur(Reg::X(9), Reg::FP, -8),
            AsmInst::Ldur(Reg::X(10), Reg::FP, -8),
            AsmInst::Stur(Reg::X(11), Reg::FP, -16),
            AsmInst::Ldur(Reg::X(11), Reg::FP, -16),
            AsmInst::Ret,
        ]);
        PostOptimizer::new().optimize(&mut p);

        assert_eq!(
            render(&p),
            vec!["stur x9, [x29, #-8]", "mov x10, x9", "stur x11, [x29, #-16]", "ret"]
        );
    }

    #[test]
    fn test_different_slots_are_untouched() {
        let mut p = program(vec![
            AsmInst::Stur(Reg::X(9), Reg::FP, -8),
            AsmInst::Ldur(Reg::X(10), Reg::FP, -16),
        ]);
        let stats = PostOptimizer::new().optimize(&mut p);
        assert_eq!(stats.instructions_before, stats.instructions_after);
        assert_eq!(stats.hits_for("forward-store-to-load"), 0);
    }

    #[test]
    fn test_move_back_is_dropped() {
        let mut p = program(vec![
            AsmInst::Mov(Reg::X(0), Reg::X(19)),
            AsmInst::Mov(Reg::X(19), Reg::X(0)),
            AsmInst::Ret,
        ]);
        PostOptimizer::new().optimize(&mut p);
        assert_eq!(render(&p), vec!["mov x0, x19", "ret"]);
    }

    #[test]
    fn test_rules_do_not_cross_labels() {
        let mut p = program(vec![
            AsmInst::Stur(Reg::X(9), Reg::FP, -8),
            AsmInst::Label(".L0".into()),
            AsmInst::Ldur(Reg::X(10), Reg::FP, -8),
            AsmInst::Mov(Reg::X(0), Reg::X(19)),
            AsmInst::Cbz(Reg::X(0), ".L0".into()),
            AsmInst::Mov(Reg::X(19), Reg::X(0)),
        ]);
        let before = render(&p);
        PostOptimizer::new().optimize(&mut p);
        assert_eq!(render(&p), before);
    }

    #[test]
    fn test_jump_to_next_label_is_removed() {
        let mut p = program(vec![
            AsmInst::B(".L1".into()),
            AsmInst::Label(".L1".into()),
            AsmInst::B(".L0".into()),
            AsmInst::Label(".L1".into()),
            AsmInst::Ret,
        ]);
        let stats = PostOptimizer::new().optimize(&mut p);

        assert_eq!(render(&p), vec![".L1:", "b .L0", ".L1:", "ret"]);
        assert_eq!(stats.hits_for("remove-jump-to-next"), 1);
    }

    struct DropEverything;

    impl PeepholeRule for DropEverything {
        fn name(&self) -> &'static str {
            "drop-everything"
        }

        fn window(&self) -> usize {
            1
        }

        fn apply(&self, window: &[AsmInst]) -> Option<Vec<AsmInst>> {
            match window {
                [AsmInst::Ret] => None,
                _ => Some(Vec::new()),
            }
        }
    }

    #[test]
    fn test_custom_rules_plug_in() {
        let mut p = program(vec![AsmInst::MovImm(Reg::X(9), 1), AsmInst::MovImm(Reg::X(10), 2), AsmInst::Ret]);
        let stats = PostOptimizer::with_rules(vec![Box::new(DropEverything)]).optimize(&mut p);
        assert_eq!(render(&p), vec!["ret"]);
        assert_eq!(stats.hits_for("drop-everything"), 2);
    }
}
