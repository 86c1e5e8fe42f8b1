use clap::{CommandFactory, Parser};
use moldstore::tooling::cli::{Cli, Commands};

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["moldstore", "serve"],
        vec!["moldstore", "serve", "--host", "127.0.0.1", "--port", "8080"],
        vec!["moldstore", "tables"],
        vec!["moldstore", "tables", "--format", "json"],
        vec!["moldstore", "show", "molds.csv"],
        vec![
            "moldstore",
            "show",
            "molds.csv",
            "--filter",
            "bumper",
            "--field",
            "MoldName",
            "--limit",
            "5",
        ],
        vec!["moldstore", "append", "shiplog.csv", "--field", "MoldID=M1"],
        vec![
            "moldstore",
            "update",
            "molds.csv",
            "M1",
            "--set",
            "MoldStatus=retired",
            "--id-field",
            "MoldID",
        ],
        vec!["moldstore", "delete", "usercomments.csv", "UC1"],
        vec!["moldstore", "--config", "./moldstore.toml", "tables"],
        vec!["moldstore", "tables", "--log-level", "debug", "--log-format", "json"],
        vec!["moldstore", "tables", "--log-output", "file+stderr"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_invalid_invocations() {
    let invalid: Vec<Vec<&str>> = vec![
        vec!["moldstore"],
        vec!["moldstore", "show"],
        vec!["moldstore", "update", "molds.csv", "M1"],
        vec!["moldstore", "append", "molds.csv", "--field", "MoldID"],
        vec!["moldstore", "serve", "--port", "not-a-port"],
        vec!["moldstore", "delete", "molds.csv"],
        vec!["moldstore", "tables", "--log-output", "syslog"],
    ];

    for args in invalid {
        assert!(
            Cli::try_parse_from(args.clone()).is_err(),
            "expected parse failure for args: {args:?}"
        );
    }
}

#[test]
fn repeated_fields_keep_order_and_values() {
    let cli = Cli::try_parse_from([
        "moldstore",
        "append",
        "molds.csv",
        "--field",
        "MoldID=M1",
        "--field",
        "MoldNotes=a=b, c",
    ])
    .unwrap();

    assert_eq!(
        cli.command,
        Commands::Append {
            table: "molds.csv".to_string(),
            fields: vec![
                ("MoldID".to_string(), "M1".to_string()),
                ("MoldNotes".to_string(), "a=b, c".to_string()),
            ],
        }
    );
}

#[test]
fn update_defaults_id_field_to_none() {
    let cli = Cli::try_parse_from(["moldstore", "update", "molds.csv", "M1", "--set", "MoldName=X"])
        .unwrap();
    match cli.command {
        Commands::Update { id_field, sets, .. } => {
            assert_eq!(id_field, None);
            assert_eq!(sets.len(), 1);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}
