use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use crate::{CliTest, stderr, stdout};

#[test]
fn test_extract_writes_manifest_and_stylesheet() -> Result<()> {
    let test = CliTest::with_files(&[
        ("src/tokens.ts", r#"export const brand = "tomato", unused = "gray";"#),
        (
            "src/button.ts",
            r#"
            import { css } from "@styleslice/core";
            import { brand } from "./tokens";
            export const button = css({ color: brand, paddingTop: 4 });
            "#,
        ),
        ("src/plain.ts", "export const nothing = 1;"),
    ])?;

    let output = test.extract(&[])?;
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Extracted 1 style call from 3 files into .styleslice (1 output)"));

    let manifest: Value = serde_json::from_str(&test.read_file(".styleslice/manifest.json")?)?;
    assert_eq!(
        manifest,
        json!({
            "@styleslice/core:css": {
                "src/button.ts": ".ss-css-0 {\n  color: tomato;\n  padding-top: 4px;\n}"
            }
        })
    );
    assert_eq!(
        test.read_file(".styleslice/styles.css")?,
        "/* src/button.ts */\n.ss-css-0 {\n  color: tomato;\n  padding-top: 4px;\n}\n"
    );
    Ok(())
}

#[test]
fn test_extract_reports_warnings_with_exit_code_one() -> Result<()> {
    let test = CliTest::with_files(&[(
        "src/a.ts",
        r#"import { css } from "@styleslice/core"; css(null); css({ margin: 0 });"#,
    )])?;

    let output = test.extract(&[])?;
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("invalid-style-argument"), "{out}");
    assert!(out.contains("1 problems (0 errors, 1 warning)"), "{out}");
    assert!(test.root().join(".styleslice/manifest.json").exists());
    Ok(())
}

#[test]
fn test_extract_structural_error_exits_two() -> Result<()> {
    let test = CliTest::with_files(&[("src/broken.ts", "const = ;")])?;

    let output = test.extract(&[])?;
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("parse-error"));
    assert!(!test.root().join(".styleslice").exists());
    Ok(())
}

#[test]
fn test_extract_invalid_config_exits_two() -> Result<()> {
    let test = CliTest::with_files(&[
        (".styleslicerc.json", r#"{ "classPrefix": "a b" }"#),
        ("src/a.ts", r#"import { css } from "@styleslice/core"; css({ margin: 0 });"#),
    ])?;

    let output = test.extract(&[])?;
    assert_eq!(output.status.code(), Some(2));
    let err = stderr(&output);
    assert!(err.contains("invalid configuration"), "{err}");
    assert!(err.contains("classPrefix"), "{err}");
    assert!(err.contains("config-error"), "{err}");
    assert!(!test.root().join(".styleslice").exists());
    Ok(())
}

#[test]
fn test_extract_flags_override_config() -> Result<()> {
    let test = CliTest::with_files(&[
        (
            "web/.styleslicerc.json",
            r#"{ "includes": ["app"], "outDir": "from-config", "classPrefix": "x-" }"#,
        ),
        (
            "web/app/page.tsx",
            r#"import { css } from "@styleslice/core"; css({ display: "grid" });"#,
        ),
    ])?;

    let output = test.extract(&["--source-root", "web", "--out-dir", "dist/css", "--emit-slices"])?;
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("__styleslice_register("));
    assert_eq!(
        test.read_file("web/dist/css/styles.css")?,
        "/* app/page.tsx */\n.x-css-0 {\n  display: grid;\n}\n"
    );
    assert!(!test.root().join("web/from-config").exists());
    Ok(())
}
