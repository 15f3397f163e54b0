use log::{debug, info};
use std::{collections::HashMap, fmt, str::FromStr};
use thiserror::Error;

use crate::calculator::{Calculator, Operator};
use crate::config::{DispatchSettings, Profile};
use crate::feedback::Feedback;
use crate::gestures::{Classification, GestureDetector, GestureId, Rgb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Digit(u8),
    Op(Operator),
    Calculate,
    Clear,
    Backspace,
    Ignore,
}

impl Action {
    pub fn default_for(g: GestureId) -> Action {
        match g {
            GestureId::None | GestureId::Unknown => Action::Ignore,
            GestureId::Num0
            | GestureId::Num1
            | GestureId::Num2
            | GestureId::Num3
            | GestureId::Num4
            | GestureId::Num5
            | GestureId::Num6
            | GestureId::Num7
            | GestureId::Num8
            | GestureId::Num9 => g.digit().map_or(Action::Ignore, Action::Digit),
            GestureId::Add => Action::Op(Operator::Add),
            GestureId::Subtract => Action::Op(Operator::Sub),
            GestureId::Multiply => Action::Op(Operator::Mul),
            GestureId::Divide => Action::Op(Operator::Div),
            GestureId::Equal => Action::Calculate,
            GestureId::ClearAll => Action::Clear,
            GestureId::Backspace => Action::Backspace,
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("digit:") {
            return match rest.trim().parse::<u8>() {
                Ok(d) if d <= 9 => Ok(Action::Digit(d)),
                _ => Err(format!("digit must be 0-9, got '{rest}'")),
            };
        }
        if let Some(rest) = s.strip_prefix("op:") {
            let mut chars = rest.trim().chars();
            return match (chars.next().and_then(Operator::from_symbol), chars.next()) {
                (Some(op), None) => Ok(Action::Op(op)),
                _ => Err(format!("operator must be one of + - * /, got '{rest}'")),
            };
        }
        match s {
            "calculate" => Ok(Action::Calculate),
            "clear" => Ok(Action::Clear),
            "backspace" => Ok(Action::Backspace),
            "ignore" => Ok(Action::Ignore),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Digit(d) => write!(f, "digit:{d}"),
            Action::Op(op) => write!(f, "op:{op}"),
            Action::Calculate => f.write_str("calculate"),
            Action::Clear => f.write_str("clear"),
            Action::Backspace => f.write_str("backspace"),
            Action::Ignore => f.write_str("ignore"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("bindings: unknown gesture '{0}'")]
    UnknownGesture(String),
    #[error("bindings: {gesture} -> {reason}")]
    BadAction { gesture: String, reason: String },
}

/// Gesture → action table: the built-in mapping overlaid with profile bindings.
#[derive(Debug, Clone, Default)]
pub struct ActionMap {
    overrides: HashMap<GestureId, Action>,
}

impl ActionMap {
    pub fn from_bindings(bindings: &HashMap<String, String>) -> Result<Self, BindingError> {
        let mut overrides = HashMap::new();
        for (key, action) in bindings {
            let gesture: GestureId = key
                .parse()
                .map_err(|_| BindingError::UnknownGesture(key.clone()))?;
            let action: Action = action.parse().map_err(|reason| BindingError::BadAction {
                gesture: key.clone(),
                reason,
            })?;
            overrides.insert(gesture, action);
        }
        Ok(Self { overrides })
    }

    pub fn resolve(&self, g: GestureId) -> Action {
        self.overrides
            .get(&g)
            .copied()
            .unwrap_or_else(|| Action::default_for(g))
    }
}

const DIGIT_COLOR: Rgb = Rgb(100, 255, 100);
const RESULT_COLOR: Rgb = Rgb(0, 255, 255);
const BACKSPACE_COLOR: Rgb = Rgb(255, 200, 0);

const DIGIT_WORDS: [&str; 10] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

/// Turns stable gestures into calculator operations, once per gesture:
/// a confidence gate, a post-action cooldown and repeat suppression keep a
/// held hand from typing the same key over and over.
#[derive(Debug)]
pub struct Dispatcher {
    actions: ActionMap,
    settings: DispatchSettings,
    calc: Calculator,
    cooldown: u32,
    last: GestureId,
    dispatched: usize,
}

impl Dispatcher {
    pub fn new(profile: &Profile) -> Result<Self, BindingError> {
        Ok(Self {
            actions: ActionMap::from_bindings(&profile.bindings)?,
            settings: profile.dispatch.clone(),
            calc: Calculator::new(),
            cooldown: 0,
            last: GestureId::None,
            dispatched: 0,
        })
    }

    /// Applies the action bound to `stable` if the gate, cooldown and repeat
    /// checks allow it. Returns the action when it took effect.
    pub fn dispatch(
        &mut self,
        stable: &Classification,
        detector: &mut GestureDetector,
        feedback: &mut Feedback,
    ) -> Option<Action> {
        let g = stable.gesture;
        if !g.is_actionable() || stable.confidence <= self.settings.confidence_gate {
            return None;
        }
        if self.cooldown > 0 || g == self.last {
            return None;
        }
        self.last = g;

        let action = self.actions.resolve(g);
        let cooldown = match self.apply(action, feedback) {
            Some(frames) => frames,
            None => {
                debug!("{g} -> {action} had no effect");
                return None;
            }
        };

        self.cooldown = cooldown;
        self.dispatched += 1;
        detector.reset();
        info!(
            "{g} -> {action} (display '{}', expr '{}')",
            self.calc.display(),
            self.calc.expression()
        );
        Some(action)
    }

    /// Cooldown to arm when the action took effect.
    fn apply(&mut self, action: Action, feedback: &mut Feedback) -> Option<u32> {
        let full = self.settings.cooldown_frames;
        match action {
            Action::Ignore => None,
            Action::Digit(d) => {
                if !self.calc.add_digit(d) {
                    return None;
                }
                feedback.show(format!("OK {d}"), DIGIT_COLOR);
                feedback.announce(DIGIT_WORDS[usize::from(d)]);
                Some(full)
            }
            Action::Op(op) => {
                if !self.calc.add_operation(op) {
                    return None;
                }
                let g = operator_gesture(op);
                feedback.show(g.display_name(), g.color());
                feedback.announce(spoken_operator(op));
                Some(full)
            }
            Action::Calculate => {
                match self.calc.calculate() {
                    Ok(result) => {
                        feedback.show_result(format!("= {result}"), RESULT_COLOR);
                        feedback.announce(format!("equals {result}"));
                    }
                    Err(e) => {
                        debug!("calculate failed: {e}");
                        feedback.show("Error", Rgb::RED);
                        feedback.announce("calculation error");
                    }
                }
                Some(full)
            }
            Action::Clear => {
                self.calc.clear_all();
                feedback.show("ALL CLEARED", Rgb::RED);
                feedback.announce("all clear");
                Some(full)
            }
            Action::Backspace => {
                self.calc.backspace();
                feedback.show("<- DELETED", BACKSPACE_COLOR);
                Some(full / 2)
            }
        }
    }

    /// Once per frame, after dispatch.
    pub fn tick(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
    }

    /// Lets the same gesture fire again, e.g. after the hands leave the frame.
    pub fn forget_last(&mut self) {
        self.last = GestureId::None;
    }

    /// New bindings and gate; calculator state and cooldown carry over.
    pub fn update_profile(&mut self, profile: &Profile) -> Result<(), BindingError> {
        self.actions = ActionMap::from_bindings(&profile.bindings)?;
        self.settings = profile.dispatch.clone();
        Ok(())
    }

    pub fn calculator(&self) -> &Calculator {
        &self.calc
    }

    pub fn cooldown(&self) -> u32 {
        self.cooldown
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}

fn operator_gesture(op: Operator) -> GestureId {
    match op {
        Operator::Add => GestureId::Add,
        Operator::Sub => GestureId::Subtract,
        Operator::Mul => GestureId::Multiply,
        Operator::Div => GestureId::Divide,
    }
}

fn spoken_operator(op: Operator) -> &'static str {
    match op {
        Operator::Add => "plus",
        Operator::Sub => "minus",
        Operator::Mul => "times",
        Operator::Div => "divided by",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedbackSettings;

    struct Rig {
        dispatcher: Dispatcher,
        detector: GestureDetector,
        feedback: Feedback,
    }

    impl Rig {
        fn new(profile: Profile) -> Self {
            Self {
                dispatcher: Dispatcher::new(&profile).unwrap(),
                detector: GestureDetector::new(&profile),
                feedback: Feedback::new(FeedbackSettings::default()),
            }
        }

        fn send(&mut self, g: GestureId, confidence: f32) -> Option<Action> {
            let c = Classification::new(g, confidence);
            self.dispatcher
                .dispatch(&c, &mut self.detector, &mut self.feedback)
        }

        fn wait_out_cooldown(&mut self) {
            while self.dispatcher.cooldown() > 0 {
                self.dispatcher.tick();
            }
        }

        fn display(&self) -> &str {
            self.dispatcher.calculator().display()
        }
    }

    fn rig() -> Rig {
        Rig::new(Profile::default())
    }

    #[test]
    fn test_default_mapping_is_total() {
        for g in GestureId::ALL {
            let a = Action::default_for(g);
            assert_eq!(a == Action::Ignore, !g.is_actionable(), "{g}");
        }
        assert_eq!(Action::default_for(GestureId::Num6), Action::Digit(6));
        assert_eq!(Action::default_for(GestureId::Divide), Action::Op(Operator::Div));
    }

    #[test]
    fn test_action_strings() {
        for s in ["digit:0", "digit:9", "op:+", "op:-", "op:*", "op:/", "calculate", "clear", "backspace", "ignore"] {
            let a: Action = s.parse().unwrap();
            assert_eq!(a.to_string(), s);
        }
        assert!("digit:10".parse::<Action>().is_err());
        assert!("op:%".parse::<Action>().is_err());
        assert!("op:++".parse::<Action>().is_err());
        assert!("launch".parse::<Action>().is_err());
    }

    #[test]
    fn test_binding_errors() {
        let bad_key = HashMap::from([("wave".to_string(), "clear".to_string())]);
        assert_eq!(
            ActionMap::from_bindings(&bad_key).unwrap_err(),
            BindingError::UnknownGesture("wave".into())
        );
        let bad_action = HashMap::from([("add".to_string(), "op:^".to_string())]);
        assert!(matches!(
            ActionMap::from_bindings(&bad_action),
            Err(BindingError::BadAction { .. })
        ));
    }

    #[test]
    fn test_gate_is_strict() {
        let mut r = rig();
        assert_eq!(r.send(GestureId::Num3, 0.7), None);
        assert_eq!(r.display(), "0");
        assert_eq!(r.send(GestureId::Num3, 0.71), Some(Action::Digit(3)));
        assert_eq!(r.display(), "3");
    }

    #[test]
    fn test_none_and_unknown_never_act() {
        let mut r = rig();
        assert_eq!(r.send(GestureId::None, 1.0), None);
        assert_eq!(r.send(GestureId::Unknown, 1.0), None);
        assert_eq!(r.dispatcher.dispatched(), 0);
    }

    #[test]
    fn test_cooldown_and_repeat() {
        let mut r = rig();
        assert!(r.send(GestureId::Num1, 1.0).is_some());
        assert_eq!(r.dispatcher.cooldown(), 25);

        // anything during cooldown is dropped
        assert_eq!(r.send(GestureId::Num2, 1.0), None);
        r.wait_out_cooldown();

        // the same gesture again is a repeat
        assert_eq!(r.send(GestureId::Num1, 1.0), None);
        r.dispatcher.forget_last();
        assert!(r.send(GestureId::Num1, 1.0).is_some());
        assert_eq!(r.display(), "11");
    }

    #[test]
    fn test_action_resets_detector() {
        use crate::hand::fixtures::upright;
        let mut r = rig();
        let hands = [upright((300.0, 400.0), [0, 1, 1, 0, 0])];
        let mut stable = Classification::no_hand();
        for _ in 0..8 {
            stable = r.detector.classify_stable(&hands);
        }
        assert_eq!(stable.gesture, GestureId::Num2);
        let (dispatcher, detector, feedback) = (&mut r.dispatcher, &mut r.detector, &mut r.feedback);
        assert_eq!(dispatcher.dispatch(&stable, detector, feedback), Some(Action::Digit(2)));
        assert_eq!(r.detector.window_len(), 0);
    }

    #[test]
    fn test_full_calculation() {
        let mut r = rig();
        for g in [GestureId::Num7, GestureId::Multiply, GestureId::Num6, GestureId::Equal] {
            assert!(r.send(g, 1.0).is_some(), "{g}");
            r.wait_out_cooldown();
        }
        assert_eq!(r.display(), "42");
        let banner = r.feedback.banner().unwrap();
        assert_eq!(banner.text, "= 42");
        assert_eq!(banner.frames_left, 60);
        assert_eq!(
            r.feedback.drain(),
            vec!["seven", "times", "six", "equals 42"]
        );
    }

    #[test]
    fn test_failed_calculation_still_cools_down() {
        let mut r = rig();
        r.send(GestureId::Num5, 1.0);
        r.wait_out_cooldown();
        r.send(GestureId::Divide, 1.0);
        r.wait_out_cooldown();
        r.send(GestureId::Num0, 1.0);
        r.wait_out_cooldown();
        assert_eq!(r.send(GestureId::Equal, 1.0), Some(Action::Calculate));
        assert_eq!(r.display(), "Error");
        assert_eq!(r.feedback.banner().map(|b| b.color), Some(Rgb::RED));
        assert_eq!(r.dispatcher.cooldown(), 25);
    }

    #[test]
    fn test_operator_without_operand_has_no_effect() {
        let mut r = rig();
        assert_eq!(r.send(GestureId::Add, 1.0), None);
        assert_eq!(r.dispatcher.cooldown(), 0);
        assert!(r.feedback.banner().is_none());
        // still counted as the last gesture
        assert_eq!(r.send(GestureId::Add, 1.0), None);
    }

    #[test]
    fn test_rebinding_and_half_cooldown_backspace() {
        let mut profile = Profile::default();
        profile
            .bindings
            .insert("clear_all".into(), "backspace".into());
        let mut r = Rig::new(profile);
        r.send(GestureId::Num4, 1.0);
        r.wait_out_cooldown();
        r.send(GestureId::Num2, 1.0);
        r.wait_out_cooldown();
        assert_eq!(r.send(GestureId::ClearAll, 1.0), Some(Action::Backspace));
        assert_eq!(r.display(), "4");
        assert_eq!(r.dispatcher.cooldown(), 12);
    }

    #[test]
    fn test_clear() {
        let mut r = rig();
        r.send(GestureId::Num9, 1.0);
        r.wait_out_cooldown();
        assert_eq!(r.send(GestureId::ClearAll, 0.9), Some(Action::Clear));
        assert_eq!(r.display(), "0");
        assert_eq!(r.feedback.banner().map(|b| b.text.as_str()), Some("ALL CLEARED"));
    }
}
