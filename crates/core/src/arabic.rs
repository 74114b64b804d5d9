//! Arabic contextual shaping and bidi reordering for burned-in text.
//!
//! Only the base letters in [`FORMS`] are shaped; everything else passes
//! through. Reordering is a simplified visual pass: odd-level runs are
//! reversed in place and a right-to-left paragraph lists its runs last to
//! first.

use unicode_bidi::{BidiInfo, Level};

/// Base letter and its `[isolated, initial, medial, final]` forms.
const FORMS: [(char, [char; 4]); 35] = [
    ('\u{0627}', ['\u{FE8D}', '\u{0627}', '\u{0627}', '\u{FE8E}']),
    ('\u{0628}', ['\u{FE8F}', '\u{FE91}', '\u{FE92}', '\u{FE90}']),
    ('\u{062A}', ['\u{FE95}', '\u{FE97}', '\u{FE98}', '\u{FE96}']),
    ('\u{062B}', ['\u{FE99}', '\u{FE9B}', '\u{FE9C}', '\u{FE9A}']),
    ('\u{062C}', ['\u{FE9D}', '\u{FE9F}', '\u{FEA0}', '\u{FE9E}']),
    ('\u{062D}', ['\u{FEA1}', '\u{FEA3}', '\u{FEA4}', '\u{FEA2}']),
    ('\u{062E}', ['\u{FEA5}', '\u{FEA7}', '\u{FEA8}', '\u{FEA6}']),
    ('\u{062F}', ['\u{FEA9}', '\u{062F}', '\u{062F}', '\u{FEAA}']),
    ('\u{0630}', ['\u{FEAB}', '\u{0630}', '\u{0630}', '\u{FEAC}']),
    ('\u{0631}', ['\u{FEAD}', '\u{0631}', '\u{0631}', '\u{FEAE}']),
    ('\u{0632}', ['\u{FEAF}', '\u{0632}', '\u{0632}', '\u{FEB0}']),
    ('\u{0633}', ['\u{FEB1}', '\u{FEB3}', '\u{FEB4}', '\u{FEB2}']),
    ('\u{0634}', ['\u{FEB5}', '\u{FEB7}', '\u{FEB8}', '\u{FEB6}']),
    ('\u{0635}', ['\u{FEB9}', '\u{FEBB}', '\u{FEBC}', '\u{FEBA}']),
    ('\u{0636}', ['\u{FEBD}', '\u{FEBF}', '\u{FEC0}', '\u{FEBE}']),
    ('\u{0637}', ['\u{FEC1}', '\u{FEC3}', '\u{FEC4}', '\u{FEC2}']),
    ('\u{0638}', ['\u{FEC5}', '\u{FEC7}', '\u{FEC8}', '\u{FEC6}']),
    ('\u{0639}', ['\u{FEC9}', '\u{FECB}', '\u{FECC}', '\u{FECA}']),
    ('\u{063A}', ['\u{FECD}', '\u{FECF}', '\u{FED0}', '\u{FECE}']),
    ('\u{0641}', ['\u{FED1}', '\u{FED3}', '\u{FED4}', '\u{FED2}']),
    ('\u{0642}', ['\u{FED5}', '\u{FED7}', '\u{FED8}', '\u{FED6}']),
    ('\u{0643}', ['\u{FED9}', '\u{FEDB}', '\u{FEDC}', '\u{FEDA}']),
    ('\u{0644}', ['\u{FEDD}', '\u{FEDF}', '\u{FEE0}', '\u{FEDE}']),
    ('\u{0645}', ['\u{FEE1}', '\u{FEE3}', '\u{FEE4}', '\u{FEE2}']),
    ('\u{0646}', ['\u{FEE5}', '\u{FEE7}', '\u{FEE8}', '\u{FEE6}']),
    ('\u{0647}', ['\u{FEE9}', '\u{FEEB}', '\u{FEEC}', '\u{FEEA}']),
    ('\u{0648}', ['\u{FEED}', '\u{0648}', '\u{0648}', '\u{FEEE}']),
    ('\u{064A}', ['\u{FEF1}', '\u{FEF3}', '\u{FEF4}', '\u{FEF2}']),
    ('\u{0626}', ['\u{FE89}', '\u{FE8B}', '\u{FE8C}', '\u{FE8A}']),
    ('\u{0622}', ['\u{FE81}', '\u{0622}', '\u{0622}', '\u{FE82}']),
    ('\u{0623}', ['\u{FE83}', '\u{0623}', '\u{0623}', '\u{FE84}']),
    ('\u{0625}', ['\u{FE87}', '\u{0625}', '\u{0625}', '\u{FE88}']),
    ('\u{0624}', ['\u{FE85}', '\u{0624}', '\u{0624}', '\u{FE86}']),
    ('\u{0649}', ['\u{FEEF}', '\u{0649}', '\u{0649}', '\u{FEF0}']),
    ('\u{0629}', ['\u{FE93}', '\u{0629}', '\u{0629}', '\u{FE94}']),
];

const ISOLATED: usize = 0;
const INITIAL: usize = 1;
const MEDIAL: usize = 2;
const FINAL: usize = 3;

fn forms(ch: char) -> Option<&'static [char; 4]> {
    FORMS.iter().find(|(base, _)| *base == ch).map(|(_, forms)| forms)
}

/// Whether `ch` joins the following letter.
fn joins_forward(ch: char) -> bool {
    forms(ch).is_some_and(|f| f[INITIAL] != ch || f[MEDIAL] != ch)
}

/// Shape Arabic letters and reorder the result for left-to-right drawing.
pub fn shape(text: &str) -> String {
    text.split('\n').map(|line| reorder(&select_forms(line))).collect::<Vec<_>>().join("\n")
}

/// Replace each tabulated letter with its positional form.
pub fn select_forms(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &ch)| {
            let Some(table) = forms(ch) else {
                return ch;
            };
            let link_prev = i > 0 && joins_forward(chars[i - 1]);
            let link_next = chars.get(i + 1).is_some_and(|&next| forms(next).is_some());
            let form = match (link_prev, link_next) {
                (true, true) => MEDIAL,
                (true, false) => FINAL,
                (false, true) => INITIAL,
                (false, false) => ISOLATED,
            };
            table[form]
        })
        .collect()
}

fn reorder(text: &str) -> String {
    let info = BidiInfo::new(text, None);
    if !info.levels.iter().any(|level| level.is_rtl()) {
        return text.to_owned();
    }

    let mut out = String::with_capacity(text.len());
    for paragraph in &info.paragraphs {
        let start = paragraph.range.start;
        let mut runs: Vec<(Level, String)> = Vec::new();
        for (offset, ch) in text[paragraph.range.clone()].char_indices() {
            let level = info.levels[start + offset];
            match runs.last_mut() {
                Some((run_level, run)) if *run_level == level => run.push(ch),
                _ => runs.push((level, ch.to_string())),
            }
        }
        for (level, run) in &mut runs {
            if level.is_rtl() {
                *run = run.chars().rev().collect();
            }
        }
        // Any RTL paragraph flips its runs, including mixed-script ones.
        if paragraph.level.is_rtl() {
            runs.reverse();
        }
        out.extend(runs.into_iter().map(|(_, run)| run));
    }
    out
}

/// Arabic, Arabic Supplement, Arabic Extended-A and Presentation Forms A/B.
pub fn is_arabic(ch: char) -> bool {
    matches!(ch,
        '\u{0600}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{08A0}'..='\u{08FF}'
        | '\u{FB50}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}')
}

/// Maximal substring whose characters agree on [`is_arabic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRun<'a> {
    pub text: &'a str,
    pub arabic: bool,
}

pub fn script_runs(text: &str) -> Vec<ScriptRun<'_>> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (index, ch) in text.char_indices() {
        let arabic = is_arabic(ch);
        match current {
            Some(previous) if previous != arabic => {
                runs.push(ScriptRun { text: &text[start..index], arabic: previous });
                start = index;
                current = Some(arabic);
            }
            None => current = Some(arabic),
            _ => {}
        }
    }
    if let Some(arabic) = current {
        runs.push(ScriptRun { text: &text[start..], arabic });
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_latin_pass_through() {
        assert_eq!(shape(""), "");
        let latin = "Hello, world 123!";
        assert_eq!(shape(latin), latin);
        assert_eq!(shape(&shape(latin)), shape(latin));
    }

    #[test]
    fn ascii_is_idempotent() {
        for sample in ["", " ", "a\nb", "(x) [y] {z}", "tabs\tand  spaces"] {
            assert_eq!(shape(&shape(sample)), shape(sample));
            assert_eq!(shape(sample), sample);
        }
    }

    #[test]
    fn joined_word_uses_positional_forms() {
        // beh teh beh: initial, medial, final
        assert_eq!(select_forms("\u{0628}\u{062A}\u{0628}"), "\u{FE91}\u{FE98}\u{FE90}");
        // visual order is reversed for drawing
        assert_eq!(shape("\u{0628}\u{062A}\u{0628}"), "\u{FE90}\u{FE98}\u{FE91}");
    }

    #[test]
    fn separated_letters_stay_isolated() {
        assert_eq!(select_forms("\u{0627} \u{0628}"), "\u{FE8D} \u{FE8F}");
    }

    #[test]
    fn non_joining_letter_breaks_the_chain() {
        // alef does not join forward, so the following beh is isolated
        assert_eq!(select_forms("\u{0627}\u{0628}"), "\u{0627}\u{FE8F}");
        // beh joins into alef, which takes its final form
        assert_eq!(select_forms("\u{0628}\u{0627}"), "\u{FE91}\u{FE8E}");
    }

    #[test]
    fn mixed_direction_in_ltr_paragraph() {
        assert_eq!(shape("abc \u{0628}\u{062A}"), "abc \u{FE96}\u{FE91}");
    }

    #[test]
    fn mixed_direction_in_rtl_paragraph() {
        assert_eq!(shape("\u{0628}\u{062A} abc"), "abc \u{FE96}\u{FE91}");
    }

    #[test]
    fn lines_are_reordered_independently() {
        assert_eq!(shape("\u{0628}\u{062A}\nhi"), "\u{FE96}\u{FE91}\nhi");
    }

    #[test]
    fn arabic_ranges() {
        assert!(is_arabic('\u{0628}'));
        assert!(is_arabic('\u{FE91}'));
        assert!(is_arabic('\u{0750}'));
        assert!(!is_arabic('a'));
        assert!(!is_arabic(' '));
        assert!(!is_arabic('\u{0700}'));
    }

    #[test]
    fn runs_split_on_script_changes() {
        let runs = script_runs("ab \u{FE96}\u{FE91} c");
        let summary: Vec<_> = runs.iter().map(|run| (run.text, run.arabic)).collect();
        assert_eq!(summary, vec![("ab ", false), ("\u{FE96}\u{FE91}", true), (" c", false)]);
        assert!(script_runs("").is_empty());
    }
}
