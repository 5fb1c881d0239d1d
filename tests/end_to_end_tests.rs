use css_purge::{purge, purge_css, PurgeArgs};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_reference_scenarios() {
    assert_eq!(
        purge_css(&[r#"<div class="box"></div>"#], ".box{color:red} .missing{color:blue}"),
        ".box{color:red}"
    );
    assert_eq!(
        purge_css(&[r#"<span id="x"></span>"#], "#x, .y { font-size: 1em }"),
        "#x { font-size: 1em }"
    );
    assert_eq!(
        purge_css(&["<p>plain</p>"], ".a:hover{text-decoration:underline}"),
        ""
    );
    assert_eq!(
        purge_css(
            &[r#"<div class="kept"></div>"#],
            "@media screen and (min-width: 800px) {\n  .kept { width: 50% }\n  .dropped { width: 10% }\n}\n"
        ),
        "@media screen and (min-width: 800px) {\n  .kept { width: 50% }\n}\n"
    );
}

#[tokio::test]
async fn test_end_to_end_fxml_views() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();

    write(&root.join("views/admin/dashboard.fxml"), r#"<?xml version="1.0" encoding="UTF-8"?>
<?import javafx.scene.control.*?>
<BorderPane xmlns:fx="http://javafx.com/fxml" fx:id="root" styleClass="admin-root">
    <top>
        <Label text="Dashboard" styleClass="title, header-label"/>
    </top>
    <center>
        <TableView fx:id="usersTable" styleClass="users-table"/>
    </center>
</BorderPane>
"#);
    write(&root.join("views/coordinator/list.fxml"), r#"<VBox styleClass="coordinator-list">
    <!-- <Button styleClass="commented-out"/> -->
    <Button styleClass="primary-button" text="Save"/>
</VBox>
"#);
    write(&root.join("views/shared/footer.fxml"), r#"<HBox styleClass="footer"/>"#);

    let css = r#"/* Global styles */
.root { -fx-font-size: 12px; }
.admin-root { -fx-background-color: white; }
.title, .subtitle { -fx-font-weight: bold; }
#usersTable .column-header { -fx-background-color: #eee; }
.primary-button:hover { -fx-background-color: derive(#07c, 20%); }
.commented-out { -fx-opacity: 0.5; }
.footer > .label { -fx-text-fill: gray; }
.unused-widget { -fx-padding: 4; }
"#;
    let css_path = root.join("global-style.css");
    write(&css_path, css);
    let output = root.join("global-style.cleaned.css");

    let args = PurgeArgs {
        content: vec![
            format!("{}/views/admin/**/*.fxml", root.display()),
            format!("{}/views/coordinator/**/*.fxml", root.display()),
            format!("{}/views/shared/**/*.fxml", root.display()),
        ],
        css: vec![css_path],
        output: Some(output.clone()),
        safelist: vec!["column-header".to_string(), "label".to_string(), "root".to_string()],
        ..PurgeArgs::default()
    };

    let result = purge(args).await.unwrap();
    assert_eq!(result.total_files_processed, 3);

    let cleaned = fs::read_to_string(&output).unwrap();
    assert_eq!(cleaned, r#"/* Global styles */
.root { -fx-font-size: 12px; }
.admin-root { -fx-background-color: white; }
.title { -fx-font-weight: bold; }
#usersTable .column-header { -fx-background-color: #eee; }
.primary-button:hover { -fx-background-color: derive(#07c, 20%); }
.footer > .label { -fx-text-fill: gray; }
"#);
    assert_eq!(result.total_rejected, 3);
}

#[tokio::test]
async fn test_report_is_written() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    write(&root.join("index.html"), r#"<main class="page"></main>"#);
    write(&root.join("site.css"), ".page {}\n.gone {}\n.gone:focus {}\n");

    let report = root.join("report.json");
    let args = PurgeArgs {
        content: vec![format!("{}/*.html", root.display())],
        css: vec![root.join("site.css")],
        output: Some(root.join("site.min.css")),
        report: Some(report.clone()),
        ..PurgeArgs::default()
    };
    let result = purge(args).await.unwrap();
    assert!(result.written.contains(&report));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    let first = &json[0];
    assert_eq!(first["rejected"][".gone"]["count"], 1);
    assert_eq!(first["rejected"][".gone"]["lines"][0], 2);
    assert_eq!(first["rejected"][".gone:focus"]["lines"][0], 3);
    assert_eq!(first["statistics"]["rules_after"], 1);
}

#[tokio::test]
async fn test_multiple_stylesheets_into_directory() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    write(&root.join("page.html"), r#"<nav class="menu"></nav>"#);
    write(&root.join("css/a.css"), ".menu { color: red }\n.x {}\n");
    write(&root.join("css/b.css"), "nav { margin: 0 }\np {}\n");

    let out_dir = root.join("dist");
    let args = PurgeArgs {
        content: vec![format!("{}/*.html", root.display())],
        css: vec![root.join("css/a.css"), root.join("css/b.css")],
        output: Some(out_dir.clone()),
        ..PurgeArgs::default()
    };
    purge(args).await.unwrap();

    assert_eq!(fs::read_to_string(out_dir.join("a.css")).unwrap(), ".menu { color: red }\n");
    assert_eq!(fs::read_to_string(out_dir.join("b.css")).unwrap(), "nav { margin: 0 }\n");
}

#[tokio::test]
async fn test_multiple_stylesheets_concatenated() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    write(&root.join("page.html"), r#"<nav class="menu"></nav>"#);
    write(&root.join("a.css"), ".menu { color: red }");
    write(&root.join("b.css"), "nav { margin: 0 }\n");

    let bundle = root.join("bundle.css");
    let args = PurgeArgs {
        content: vec![format!("{}/*.html", root.display())],
        css: vec![root.join("a.css"), root.join("b.css")],
        output: Some(bundle.clone()),
        ..PurgeArgs::default()
    };
    purge(args).await.unwrap();

    assert_eq!(fs::read_to_string(bundle).unwrap(), ".menu { color: red }\nnav { margin: 0 }\n");
}

#[tokio::test]
async fn test_config_file_with_cli_overrides() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    write(&root.join("views/a.html"), r#"<div class="card"></div><script>el.classList.add("is-open")</script>"#);
    write(&root.join("style.css"), ".card {}\n.is-open {}\n.modal .close {}\n@keyframes spin { to { opacity: 0 } }\n");

    let config_path = root.join("purge.yaml");
    write(&config_path, &format!(
        "content:\n  - \"{root}/views/*.html\"\ncss:\n  - \"{root}/style.css\"\noutput: \"{root}/out.css\"\ngreedy_safelist:\n  - pattern: \"^modal$\"\nextractor: words\n",
        root = root.display()
    ));

    let args = PurgeArgs {
        config: Some(config_path),
        keyframes: true,
        ..PurgeArgs::default()
    };
    purge(args).await.unwrap();

    assert_eq!(
        fs::read_to_string(root.join("out.css")).unwrap(),
        ".card {}\n.is-open {}\n.modal .close {}\n"
    );
}

#[tokio::test]
async fn test_config_paths_resolve_against_config_directory() {
    let temp_dir = tempdir().unwrap();
    let project = temp_dir.path().join("project");
    write(&project.join("views/a.html"), r#"<div class="card"></div>"#);
    write(&project.join("style.css"), ".card {}\n.unused {}\n");

    let config_path = project.join("purge.yaml");
    write(&config_path, "content:\n  - views/*.html\ncss:\n  - style.css\noutput: dist/style.css\n");

    let args = PurgeArgs {
        config: Some(config_path),
        ..PurgeArgs::default()
    };
    purge(args).await.unwrap();

    assert_eq!(fs::read_to_string(project.join("dist/style.css")).unwrap(), ".card {}\n");
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    write(&root.join("a.html"), "<p></p>");
    write(&root.join("a.css"), "p {} .x {}");

    let output = root.join("out.css");
    let args = PurgeArgs {
        content: vec![format!("{}/*.html", root.display())],
        css: vec![root.join("a.css")],
        output: Some(output.clone()),
        dry_run: true,
        ..PurgeArgs::default()
    };
    let result = purge(args).await.unwrap();

    assert!(result.written.is_empty());
    assert!(!output.exists());
    assert_eq!(result.outputs[0].1.css, "p {}");
}
