use test_case::test_case;

use super::*;

fn foundation() -> E0s {
    E0s::from_iter([(1, -1.125), (6, -8.5), (8, -4.875), (20, -2.0)])
}

#[test]
fn config() {
    let got = Config::load("testfiles/test.toml").unwrap();
    let want = Config {
        training: String::from("train.xyz"),
        validation: Some(String::from("valid.xyz")),
        energy_key: String::from("REF_energy"),
        elements: ElementSet::new(vec![1, 6, 8, 20]).unwrap(),
        foundation_e0s: foundation(),
        model: ModelKind::Stored {
            key: String::from("MACE_energy"),
        },
        rcond: 1e-12,
        threads: 2,
    };
    assert_eq!(got, want);
}

#[test]
fn table() {
    let got = Config::load("testfiles/table.toml").unwrap();
    let want = Config {
        training: String::from("train.xyz"),
        validation: None,
        energy_key: String::from("energy"),
        elements: ElementSet::new(vec![1, 8]).unwrap(),
        foundation_e0s: E0s::from_iter([(1, -1.125), (8, -4.875), (20, -2.0)]),
        model: ModelKind::Baseline,
        rcond: DEFAULT_RCOND,
        threads: 0,
    };
    assert_eq!(got, want);
}

#[test]
fn e0_file() {
    let got = Config::load("testfiles/file.toml").unwrap();
    assert_eq!(got.elements.as_slice(), &[8, 1]);
    assert_eq!(got.foundation_e0s, foundation());
    assert_eq!(
        got.model,
        ModelKind::Command {
            program: String::from("mace_eval"),
            args: ["--model", "medium.model", "--device", "cpu"]
                .map(String::from)
                .to_vec(),
        }
    );
}

const BASE: &str = r#"
training = "train.xyz"
elements = ["H", "O"]
foundation_e0s = "{1: -1.125, 8: -4.875}"
model = { kind = "baseline" }
"#;

#[test]
fn command_without_args() {
    let input = BASE.replace(
        r#"{ kind = "baseline" }"#,
        r#"{ kind = "command", program = "./predict.sh" }"#,
    );
    let got: Config = input.parse().unwrap();
    assert_eq!(
        got.model,
        ModelKind::Command {
            program: String::from("./predict.sh"),
            args: Vec::new(),
        }
    );
}

#[test_case(r#"["H", "Xx"]"#, ConfigError::UnknownElement("Xx".into()); "unknown symbol")]
#[test_case(r#"["H", 0]"#, ConfigError::UnknownElement("0".into()); "zero")]
#[test_case(r#"["H", "O", 1]"#, ConfigError::Elements(E0Error::DuplicateElement(1)); "duplicate")]
#[test_case("[]", ConfigError::Elements(E0Error::EmptyElements); "empty")]
fn bad_elements(elements: &str, want: ConfigError) {
    let input = BASE.replace(r#"["H", "O"]"#, elements);
    assert_eq!(input.parse::<Config>(), Err(want));
}

#[test_case(r#""{1: -1.125, 8: oops}""#; "bad literal")]
#[test_case(r#"{ H = -1.125, h = -1.0 }"#; "duplicate table entry")]
#[test_case(r#"{ file = "testfiles/missing.e0s" }"#; "missing file")]
fn bad_e0s(e0s: &str) {
    let input = BASE.replace(r#""{1: -1.125, 8: -4.875}""#, e0s);
    let got = input.parse::<Config>();
    assert!(matches!(got, Err(ConfigError::E0s(_))), "{got:?}");
}

#[test]
fn unknown_field() {
    let input = format!("{BASE}\nsleep_int = 2\n");
    let got = input.parse::<Config>();
    assert!(matches!(got, Err(ConfigError::Toml(_))), "{got:?}");
}

#[test]
fn missing_config() {
    let got = Config::load("testfiles/nonexistent.toml");
    assert!(matches!(got, Err(ConfigError::Io(_))));
}

#[test]
fn model_display() {
    let got = ModelKind::Command {
        program: String::from("mace_eval"),
        args: vec![],
    };
    assert_eq!(got.to_string(), "command (mace_eval)");
}
