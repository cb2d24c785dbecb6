// widgetdesk-widgets/src/calculator.rs
//! Calculator widget and the expression evaluator behind it.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?
//! primary := number | '(' expr ')'
//! ```
//!
//! `^` is right associative and binds tighter than unary minus, so
//! `-2^2` is `-4` and `2^-1` is `0.5`.

use crossterm::event::KeyCode;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    prelude::Widget as RatatuiWidget,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::Paragraph,
};
use std::iter::Peekable;
use std::str::CharIndices;
use widgetdesk_core::{Event, EventResult, Locale, Size, Widget, WidgetConfig, WidgetContext};

use crate::common::widget_block;

pub const MAX_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected '{0}' at {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NotFinite,
}

/// Evaluate an arithmetic expression
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let mut parser = Parser {
        chars: expression.char_indices().peekable(),
    };

    if parser.peek().is_none() {
        return Err(CalcError::Empty);
    }

    let value = parser.expr()?;
    if let Some((pos, c)) = parser.next() {
        return Err(CalcError::UnexpectedChar(c, pos));
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

struct Parser<'a> {
    chars: Peekable<CharIndices<'a>>,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.peek().map(|(_, c)| *c)
    }

    fn next(&mut self) -> Option<(usize, char)> {
        self.skip_whitespace();
        self.chars.next()
    }

    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.next();
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.next();
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err(CalcError::DivisionByZero),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some('-') => {
                self.next();
                Ok(-self.unary()?)
            }
            Some('+') => {
                self.next();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.primary()?;
        if self.peek() == Some('^') {
            self.next();
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some('(') => {
                self.next();
                let value = self.expr()?;
                match self.next() {
                    Some((_, ')')) => Ok(value),
                    Some((pos, c)) => Err(CalcError::UnexpectedChar(c, pos)),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(_) => match self.next() {
                Some((pos, c)) => Err(CalcError::UnexpectedChar(c, pos)),
                None => Err(CalcError::UnexpectedEnd),
            },
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn number(&mut self) -> Result<f64, CalcError> {
        let mut literal = String::new();
        while let Some((_, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit() || *c == '.') {
            literal.push(c);
        }
        literal
            .parse()
            .map_err(|_| CalcError::InvalidNumber(literal))
    }
}

/// Integers without a fraction, everything else trimmed to 10 decimals
pub fn format_result(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let text = format!("{:.10}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Expression input with a history of recent results
///
/// # Keyboard Shortcuts
/// - digits, `.`, `+ - * / % ^ ( )` - Edit the expression
/// - `Enter` or `=` - Evaluate
/// - `Backspace` - Delete the last character
/// - `Esc` - Clear the input
pub struct CalculatorWidget {
    input: String,
    outcome: Option<Result<String, CalcError>>,
    history: Vec<String>,
    locale: Locale,
}

impl CalculatorWidget {
    pub fn new(ctx: &WidgetContext) -> Self {
        Self {
            input: String::new(),
            outcome: None,
            history: Vec::new(),
            locale: ctx.locale,
        }
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Evaluate the current input; the result replaces it
    pub fn submit(&mut self) {
        match evaluate(&self.input) {
            Ok(value) => {
                let result = format_result(value);
                self.history
                    .insert(0, format!("{} = {}", self.input.trim(), result));
                self.history.truncate(MAX_HISTORY);
                self.input = result.clone();
                self.outcome = Some(Ok(result));
            }
            Err(e) => self.outcome = Some(Err(e)),
        }
    }
}

fn is_expression_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | '*' | '/' | '%' | '^' | '(' | ')' | ' ')
}

impl Widget for CalculatorWidget {
    fn on_activate(&mut self, config: &WidgetConfig) {
        if let Some(history) = config.settings.get("history").and_then(|h| h.as_array()) {
            self.history = history
                .iter()
                .filter_map(|entry| entry.as_str().map(str::to_string))
                .take(MAX_HISTORY)
                .collect();
        }
    }

    fn on_event(&mut self, event: Event) -> EventResult {
        let Event::Key(key) = event else {
            return EventResult::Ignored;
        };

        match key.code {
            KeyCode::Enter | KeyCode::Char('=') => self.submit(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Esc => {
                self.input.clear();
                self.outcome = None;
            }
            KeyCode::Char('x') => self.input.push('*'),
            KeyCode::Char(c) if is_expression_char(c) => self.input.push(c),
            _ => return EventResult::Ignored,
        }
        EventResult::Consumed
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        self.render_focused(area, buf, false);
    }

    fn render_focused(&mut self, area: Rect, buf: &mut Buffer, focused: bool) {
        let mut lines = vec![Line::styled(
            format!("> {}", self.input),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )];

        match &self.outcome {
            Some(Ok(result)) => {
                lines.push(Line::styled(
                    format!("= {}", result),
                    Style::default().fg(Color::Green),
                ));
            }
            Some(Err(e)) => {
                lines.push(Line::styled(
                    format!("{}: {}", self.locale.tr("calculator.error"), e),
                    Style::default().fg(Color::Red),
                ));
            }
            None => lines.push(Line::from("")),
        }

        lines.extend(
            self.history
                .iter()
                .map(|entry| Line::styled(entry.clone(), Style::default().fg(Color::DarkGray))),
        );

        Paragraph::new(lines)
            .block(widget_block(self.locale.tr("calculator.title"), focused))
            .render(area, buf);
    }

    fn preferred_size(&self) -> Option<Size> {
        Some(Size {
            width: 30,
            height: 9,
        })
    }

    fn on_locale_changed(&mut self, locale: &Locale) {
        self.locale = *locale;
    }

    fn store_settings(&self, config: &mut WidgetConfig) {
        config.set("history", self.history.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(evaluate("1 + 2 * 3"), Ok(7.0));
        assert_eq!(evaluate("(1 + 2) * 3"), Ok(9.0));
        assert_eq!(evaluate("10 - 4 - 3"), Ok(3.0));
        assert_eq!(evaluate("2 ^ 3 ^ 2"), Ok(512.0));
        assert_eq!(evaluate("7 % 4"), Ok(3.0));
        assert_eq!(evaluate("1.5 * 4"), Ok(6.0));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(evaluate("-3 + 5"), Ok(2.0));
        assert_eq!(evaluate("-2^2"), Ok(-4.0));
        assert_eq!(evaluate("2^-1"), Ok(0.5));
        assert_eq!(evaluate("--4"), Ok(4.0));
        assert_eq!(evaluate("3 * -(1 + 1)"), Ok(-6.0));
    }

    #[test]
    fn test_errors() {
        assert_eq!(evaluate(""), Err(CalcError::Empty));
        assert_eq!(evaluate("   "), Err(CalcError::Empty));
        assert_eq!(evaluate("1 / 0"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("5 % 0"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("(1 + 2"), Err(CalcError::UnexpectedEnd));
        assert_eq!(evaluate("1 +"), Err(CalcError::UnexpectedEnd));
        assert_eq!(evaluate("1 2"), Err(CalcError::UnexpectedChar('2', 2)));
        assert_eq!(evaluate("2 * a"), Err(CalcError::UnexpectedChar('a', 4)));
        assert_eq!(
            evaluate("1.2.3"),
            Err(CalcError::InvalidNumber("1.2.3".to_string()))
        );
        assert_eq!(evaluate("10 ^ 400"), Err(CalcError::NotFinite));
    }

    #[test]
    fn test_format_result() {
        assert_eq!(format_result(42.0), "42");
        assert_eq!(format_result(-4.0), "-4");
        assert_eq!(format_result(0.5), "0.5");
        assert_eq!(format_result(1.0 / 3.0), "0.3333333333");
    }

    #[test]
    fn test_history_is_capped() {
        let mut calc = CalculatorWidget::new(&WidgetContext {
            name: "calculator".to_string(),
            environment: Default::default(),
            bus: widgetdesk_core::EventBus::new(),
            locale: Locale::default(),
        });

        for i in 0..12 {
            calc.input = format!("{} + 1", i);
            calc.submit();
        }
        assert_eq!(calc.history().len(), MAX_HISTORY);
        assert_eq!(calc.history()[0], "11 + 1 = 12");

        calc.input = "1/0".to_string();
        calc.submit();
        assert_eq!(calc.history().len(), MAX_HISTORY);
        assert_eq!(calc.outcome, Some(Err(CalcError::DivisionByZero)));
    }
}
