//! Line tokenizer with a command / block / string context stack
//!
//! | Context | Special characters |
//! |---------|--------------------|
//! | command | `( ) , ' { } space tab . #` |
//! | block | `( ) , ' { } space tab` |
//! | string | `'` |
//!
//! `{` and `}` are emitted as tokens, the other special characters only end
//! the current token. A `#` in command context ends the line, and a `.`
//! between two digits stays inside a number. So the call-like form
//! `retina.Create('LinearFilter','L1',{'tau','2'})` and the plain form
//! `retina Create LinearFilter L1 {tau 2}` give the same tokens.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Context {
    Command,
    Block,
    Str,
}

struct Lexer {
    stack: Vec<Context>,
    tokens: Vec<String>,
    current: String,
}

impl Lexer {
    fn context(&self) -> Context {
        self.stack.last().copied().unwrap_or(Context::Command)
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.tokens.push(std::mem::take(&mut self.current));
        }
    }

    fn emit(&mut self, token: &str) {
        self.flush();
        self.tokens.push(token.to_string());
    }
}

/// Split one script line into tokens
pub fn tokenize(line: &str, line_no: usize) -> Vec<String> {
    let mut lx = Lexer {
        stack: vec![Context::Command],
        tokens: Vec::new(),
        current: String::new(),
    };
    let chars: Vec<char> = line.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        let ctx = lx.context();
        if ctx == Context::Str {
            if c == '\'' {
                lx.flush();
                lx.stack.pop();
            } else {
                lx.current.push(c);
            }
            continue;
        }

        match c {
            c if c.is_whitespace() => lx.flush(),
            '\'' => {
                lx.flush();
                lx.stack.push(Context::Str);
            }
            '{' => {
                lx.emit("{");
                lx.stack.push(Context::Block);
            }
            '}' => {
                if ctx == Context::Block {
                    lx.stack.pop();
                } else {
                    log::warn!("line {}: unmatched '}}'", line_no);
                }
                lx.emit("}");
            }
            '(' | ')' | ',' => lx.flush(),
            '#' if ctx == Context::Command => {
                lx.flush();
                break;
            }
            '.' if ctx == Context::Command => {
                let between_digits = i > 0
                    && chars[i - 1].is_ascii_digit()
                    && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                if between_digits && !lx.current.is_empty() {
                    lx.current.push('.');
                } else {
                    lx.flush();
                }
            }
            c => lx.current.push(c),
        }
    }

    if lx.context() == Context::Str {
        log::warn!("line {}: unterminated string", line_no);
    }
    lx.flush();
    lx.tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<String> {
        tokenize(line, 1)
    }

    #[test]
    fn test_call_form_equals_plain_form() {
        assert_eq!(
            toks("retina.Create('LinearFilter','L1',{'tau','2'})"),
            toks("retina Create LinearFilter L1 {tau 2}")
        );
        assert_eq!(
            toks("retina Create LinearFilter L1 {tau 2}"),
            vec!["retina", "Create", "LinearFilter", "L1", "{", "tau", "2", "}"]
        );
    }

    #[test]
    fn test_signs_and_nested_blocks() {
        assert_eq!(
            toks("retina.Connect({'SNL_horizontal',-,'SNL_photoreceptors'},'Gauss_bipolar','Current')"),
            vec![
                "retina",
                "Connect",
                "{",
                "SNL_horizontal",
                "-",
                "SNL_photoreceptors",
                "}",
                "Gauss_bipolar",
                "Current"
            ]
        );
        assert_eq!(
            toks("retina.Create('SingleCompartment','b',{'Rm','0.0','E',{'0.0','-70.5'}})"),
            vec![
                "retina",
                "Create",
                "SingleCompartment",
                "b",
                "{",
                "Rm",
                "0.0",
                "E",
                "{",
                "0.0",
                "-70.5",
                "}",
                "}"
            ]
        );
    }

    #[test]
    fn test_comments() {
        assert!(toks("# whole line").is_empty());
        assert!(toks("   ### banner ###").is_empty());
        assert_eq!(toks("retina.TempStep('1') # step"), vec!["retina", "TempStep", "1"]);
    }

    #[test]
    fn test_numbers_keep_their_dot() {
        assert_eq!(toks("retina TempStep 0.5"), vec!["retina", "TempStep", "0.5"]);
        assert_eq!(toks("retina SimTime 12.25e1"), vec!["retina", "SimTime", "12.25e1"]);
        // Inside a block the dot is never special
        assert_eq!(toks("{sigma .3}"), vec!["{", "sigma", ".3", "}"]);
    }

    #[test]
    fn test_strings_keep_spaces_and_special_characters() {
        assert_eq!(
            toks("retina.multimeter('temporal','Ganglion cell','g',{'x','5'})"),
            vec!["retina", "multimeter", "temporal", "Ganglion cell", "g", "{", "x", "5", "}"]
        );
        assert_eq!(
            toks("retina.Input('sequence','input/seq.1/',{'InputFramePeriod','100'})"),
            vec!["retina", "Input", "sequence", "input/seq.1/", "{", "InputFramePeriod", "100", "}"]
        );
    }

    #[test]
    fn test_malformed_nesting_continues() {
        assert_eq!(toks("a } b"), vec!["a", "}", "b"]);
        assert_eq!(toks("retina 'open"), vec!["retina", "open"]);
    }
}
