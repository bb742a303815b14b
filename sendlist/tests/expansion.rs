//! End-to-end recipient expansion: aliases, `:include:` and `.forward`
//! files, duplicate suppression, loop breaking and trust gating.
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::os::unix::fs::MetadataExt;

use pretty_assertions::assert_eq;
use sendlist::Severity;
use sendlist_common::{Mailer, QueueFlags};
use support::{Harness, deliverable, entry, include_entry, messages, queued};

#[test]
fn test_duplicate_is_merged_not_reexpanded() {
    let harness = Harness::new().alias("team", "alice");
    let resolution = harness.resolve("team, team, alice");

    assert_eq!(queued(&resolution), vec!["team", "alice"]);
    assert_eq!(deliverable(&resolution), vec!["alice"]);
    assert_eq!(resolution.recipient_count(), 2);

    let messages = messages(&resolution);
    assert_eq!(messages.iter().filter(|m| m.starts_with("aliased to")).count(), 1);
    assert_eq!(messages.iter().filter(|m| *m == "duplicate suppressed").count(), 2);
}

#[test]
fn test_same_remote_address_twice() {
    let resolution = Harness::new().resolve("a@h, a@h");

    assert_eq!(resolution.queue().len(), 1);
    let node = entry(&resolution, "a");
    assert_eq!(node.address.mailer, Mailer::Remote);
    assert!(node.flags.contains(QueueFlags::PRIMARY));
    assert_eq!(resolution.diagnostics().errors().count(), 0);
    assert_eq!(deliverable(&resolution), vec!["a@h"]);
}

#[test]
fn test_duplicate_does_not_reread_forward_file() {
    let mut harness = Harness::new();
    let home = harness.local_user("fwd");
    std::fs::write(home.join(".forward"), "bob\n").unwrap();
    let resolution = harness.resolve("fwd, fwd");

    assert_eq!(queued(&resolution), vec!["fwd", "bob"]);
    assert_eq!(deliverable(&resolution), vec!["bob"]);
    assert_eq!(
        messages(&resolution)
            .iter()
            .filter(|m| *m == "forwarding to bob")
            .count(),
        1
    );
}

#[test]
fn test_mutual_aliases_stop_at_the_duplicate() {
    let resolution = Harness::new()
        .alias("ping", "pong")
        .alias("pong", "ping")
        .resolve("ping");

    assert_eq!(queued(&resolution), vec!["ping", "pong"]);
    assert_eq!(deliverable(&resolution), Vec::<String>::new());
    assert_eq!(
        messages(&resolution),
        vec!["aliased to pong", "aliased to ping", "duplicate suppressed"]
    );
    assert_eq!(resolution.diagnostics().errors().count(), 0);
}

#[test]
fn test_self_referencing_alias_stays_sendable() {
    let harness = Harness::new().alias("alice", "alice");
    let resolution = harness.resolve("alice");

    assert_eq!(queued(&resolution), vec!["alice"]);
    assert_eq!(deliverable(&resolution), vec!["alice"]);
    assert_eq!(entry(&resolution, "alice").child, None);
}

#[test]
fn test_alias_without_self_reference_is_replaced() {
    let resolution = Harness::new().alias("staff", "bob, carol").resolve("staff");

    assert!(entry(&resolution, "staff").flags.contains(QueueFlags::DONT_SEND));
    assert_eq!(deliverable(&resolution), vec!["bob", "carol"]);
}

#[test]
fn test_alias_with_self_reference_keeps_controller() {
    let resolution = Harness::new().alias("alice", "alice, bob").resolve("alice");

    assert!(entry(&resolution, "alice").is_sendable());
    assert_eq!(deliverable(&resolution), vec!["alice", "bob"]);
}

#[test]
fn test_deep_alias_chain_is_cut_off_at_the_limit() {
    let mut harness = Harness::new().config(|config| config.max_recursion = 3);
    for n in 0..9 {
        harness = harness.alias(&format!("a{n}"), &format!("a{}", n + 1));
    }
    let resolution = harness.resolve("a0, bob");

    assert_eq!(queued(&resolution), vec!["a0", "a1", "a2", "a3", "bob"]);
    assert_eq!(deliverable(&resolution), vec!["bob"]);

    let broken: Vec<_> = resolution
        .diagnostics()
        .errors()
        .map(ToString::to_string)
        .collect();
    assert_eq!(broken, vec!["a4... aliasing/forwarding loop broken"]);
}

#[test]
fn test_singleton_alias_target_inherits_primary() {
    let resolution = Harness::new()
        .alias("one", "alice")
        .alias("many", "bob, carol")
        .alias("trailing", "dave,")
        .resolve("one, many, trailing");

    assert!(entry(&resolution, "alice").flags.contains(QueueFlags::PRIMARY));
    assert!(!entry(&resolution, "bob").flags.contains(QueueFlags::PRIMARY));
    assert!(!entry(&resolution, "carol").flags.contains(QueueFlags::PRIMARY));
    assert!(!entry(&resolution, "dave").flags.contains(QueueFlags::PRIMARY));
}

#[test]
fn test_program_without_trust_is_rejected() {
    let resolution = Harness::new().resolve("|/usr/bin/archive");

    assert_eq!(resolution.queue().len(), 1);
    let node = entry(&resolution, "/usr/bin/archive");
    assert_eq!(node.address.mailer, Mailer::Program);
    assert!(node.flags.contains(QueueFlags::BAD_ADDRESS));
    assert_eq!(deliverable(&resolution), Vec::<String>::new());
    assert!(messages(&resolution).contains(&"Cannot mail directly to programs".to_string()));
}

#[test]
fn test_trailing_pipe_is_an_unknown_user() {
    let resolution = Harness::new().resolve("prog|, ");

    assert_eq!(resolution.queue().len(), 1);
    assert!(resolution.has_bad_addresses());
    assert_eq!(resolution.deliverable().count(), 0);
}

#[test]
fn test_file_without_trust_is_rejected() {
    let harness = Harness::new();
    let mbox = harness.path().join("mbox");
    let resolution = harness.resolve(&mbox.display().to_string());

    let node = entry(&resolution, &mbox.display().to_string());
    assert_eq!(node.address.mailer, Mailer::File);
    assert!(node.flags.contains(QueueFlags::BAD_ADDRESS));
    assert!(messages(&resolution).contains(&"Cannot mail directly to files".to_string()));
}

#[test]
fn test_alias_file_grants_trust_to_programs_and_files() {
    let harness = Harness::new();
    let mbox = harness.path().join("archive.mbox");
    let harness = harness.alias(
        "archive",
        &format!("\"|/usr/bin/archive -q\", {}", mbox.display()),
    );
    let resolution = harness.resolve("archive");

    assert_eq!(
        deliverable(&resolution),
        vec!["/usr/bin/archive -q".to_string(), mbox.display().to_string()]
    );
    assert_eq!(
        entry(&resolution, "/usr/bin/archive -q").address.mailer,
        Mailer::Program
    );
    assert_eq!(
        entry(&resolution, &mbox.display().to_string()).address.mailer,
        Mailer::File
    );
}

#[test]
fn test_force_mail_lifts_the_trust_gate() {
    let harness = Harness::new().config(|config| config.force_mail = true);
    let resolution = harness.resolve("|/usr/bin/archive");

    assert_eq!(deliverable(&resolution), vec!["/usr/bin/archive"]);
}

#[test]
fn test_file_with_execute_bit_is_rejected() {
    let harness = Harness::new();
    let script = harness.file("script", "", 0o700);
    let plain = harness.file("plain", "", 0o600);
    let harness = harness.alias(
        "files",
        &format!("{}, {}", script.display(), plain.display()),
    );
    let resolution = harness.resolve("files");

    let script = script.display().to_string();
    assert!(entry(&resolution, &script).flags.contains(QueueFlags::BAD_ADDRESS));
    assert!(messages(&resolution).contains(&format!("Cannot create {script}")));
    assert_eq!(deliverable(&resolution), vec![plain.display().to_string()]);
}

#[test]
fn test_include_is_expanded_in_place() {
    let harness = Harness::new();
    let list = harness.file("list", "alice\n\nbob, carol\n", 0o644);
    let harness = harness.alias("staff", &format!(":include:{}", list.display()));
    let resolution = harness.resolve("dave, staff, erin");

    assert_eq!(
        deliverable(&resolution),
        vec!["dave", "alice", "bob", "carol", "erin"]
    );

    let include = include_entry(&resolution);
    assert!(include.flags.contains(QueueFlags::DONT_SEND));
    assert!(entry(&resolution, "staff").flags.contains(QueueFlags::DONT_SEND));
}

#[test]
fn test_include_members_point_at_the_directive() {
    let harness = Harness::new();
    let list = harness.file("list", "u1\nu2\n", 0o644);
    let harness = harness.alias("staff", &format!(":include:{}", list.display()));
    let resolution = harness.resolve("staff");

    let directive = resolution
        .queue()
        .iter()
        .copied()
        .find(|&id| resolution.arena()[id].address.mailer == Mailer::Include)
        .unwrap();

    assert_eq!(queued(&resolution).len(), 4);
    assert_eq!(entry(&resolution, "u1").alias, Some(directive));
    assert_eq!(entry(&resolution, "u2").alias, Some(directive));
}

#[test]
fn test_include_from_sender_is_rejected() {
    let harness = Harness::new();
    let list = harness.file("list", "alice\n", 0o644);
    let resolution = harness.resolve(&format!(":include:{}", list.display()));

    assert!(include_entry(&resolution).flags.contains(QueueFlags::BAD_ADDRESS));
    assert!(messages(&resolution).contains(&"Cannot mail directly to :include:s".to_string()));
    assert_eq!(resolution.deliverable().count(), 0);
}

#[test]
fn test_forced_include_adopts_file_owner() {
    let harness = Harness::new().config(|config| config.force_mail = true);
    let mbox = harness.path().join("out.mbox");
    let list = harness.file("list", &format!("{}\n", mbox.display()), 0o644);
    let resolution = harness.resolve(&format!(":include:{}", list.display()));

    let include = include_entry(&resolution);
    let owner = std::fs::metadata(&list).unwrap().uid();
    assert_eq!(include.owner().map(|o| o.uid), Some(owner));
    assert_eq!(deliverable(&resolution), vec![mbox.display().to_string()]);
}

#[test]
fn test_missing_include_is_reported_and_skipped() {
    let resolution = Harness::new()
        .alias("staff", ":include:/nonexistent/list")
        .resolve("staff, bob");

    assert_eq!(deliverable(&resolution), vec!["bob"]);
    assert!(
        resolution
            .diagnostics()
            .errors()
            .any(|d| d.severity == Severity::UserError
                && d.message.starts_with("Cannot open /nonexistent/list"))
    );
}

#[test]
fn test_include_line_with_invalid_utf8_does_not_stop_the_file() {
    let harness = Harness::new();
    let list = harness.path().join("list");
    std::fs::write(&list, b"alice\n\xffbad\r\nbob\n").unwrap();
    let harness = harness.alias("staff", &format!(":include:{}", list.display()));
    let resolution = harness.resolve("staff");

    assert_eq!(deliverable(&resolution), vec!["alice", "bob"]);
    assert!(
        !resolution
            .diagnostics()
            .iter()
            .any(|d| d.severity == Severity::SystemError)
    );
    assert_eq!(
        resolution
            .diagnostics()
            .errors()
            .filter(|d| d.message == "User unknown: \u{fffd}bad")
            .count(),
        1
    );
}

#[test]
fn test_sender_suppression() {
    let harness = Harness::new();
    let mut resolver = harness.resolver();

    resolver.send_to("alice", None, QueueFlags::PSEUDO | QueueFlags::DONT_SEND);
    resolver.send_to("alice", None, QueueFlags::PSEUDO | QueueFlags::DONT_SEND);
    assert_eq!(resolver.diagnostics().len(), 0);

    resolver.send_to("alice, bob", None, QueueFlags::EMPTY);
    let resolution = resolver.finish();

    let alice = entry(&resolution, "alice");
    assert!(!alice.flags.contains(QueueFlags::PSEUDO));
    assert!(alice.flags.contains(QueueFlags::DONT_SEND));
    assert_eq!(deliverable(&resolution), vec!["bob"]);
}

#[test]
fn test_forward_file() {
    let mut harness = Harness::new();
    let home = harness.local_user("fwd");
    std::fs::write(home.join(".forward"), "bob, \\fwd\n").unwrap();
    let resolution = harness.resolve("fwd");

    assert!(entry(&resolution, "fwd").flags.contains(QueueFlags::DONT_SEND));
    assert_eq!(deliverable(&resolution), vec!["bob", "\\fwd"]);
    assert!(messages(&resolution).contains(&"forwarding to bob, \\fwd".to_string()));
}

#[test]
fn test_quoted_user_skips_forward_file() {
    let mut harness = Harness::new();
    let home = harness.local_user("fwd");
    std::fs::write(home.join(".forward"), "bob\n").unwrap();
    let resolution = harness.resolve("\\fwd");

    assert_eq!(deliverable(&resolution), vec!["\\fwd"]);
}

#[test]
fn test_unknown_user() {
    let resolution = Harness::new().resolve("nobody-here, bob");

    assert!(entry(&resolution, "nobody-here").flags.contains(QueueFlags::BAD_ADDRESS));
    assert!(resolution.has_bad_addresses());
    assert_eq!(deliverable(&resolution), vec!["bob"]);
    assert!(messages(&resolution).contains(&"User unknown: nobody-here".to_string()));
}

#[test]
fn test_full_name_is_canonicalised() {
    let resolution = Harness::new().resolve("John_Smith");

    assert_eq!(deliverable(&resolution), vec!["jsmith"]);
    assert!(messages(&resolution).contains(&"sending to John Smith <jsmith>".to_string()));
    assert_eq!(
        entry(&resolution, "jsmith").address.display_name.as_deref(),
        Some("John Smith")
    );

    let resolution = Harness::new().resolve("jsmith, John.Smith");
    assert_eq!(resolution.queue().len(), 2);
    assert_eq!(deliverable(&resolution), vec!["jsmith"]);
}

#[test]
fn test_alias_to_own_full_name_delivers_to_login() {
    let resolution = Harness::new().alias("jsmith", "John_Smith").resolve("jsmith");

    assert_eq!(queued(&resolution), vec!["jsmith", "John_Smith"]);
    assert_eq!(deliverable(&resolution), vec!["jsmith"]);
    assert!(messages(&resolution).contains(&"sending to John Smith <jsmith>".to_string()));

    let jsmith = entry(&resolution, "jsmith");
    assert_eq!(jsmith.owner().map(|o| o.uid), Some(1006));
    assert_eq!(jsmith.address.display_name.as_deref(), Some("John Smith"));
    assert!(entry(&resolution, "John_Smith").flags.contains(QueueFlags::DONT_SEND));
}

#[test]
fn test_alias_to_own_login_in_other_case_delivers() {
    let resolution = Harness::new().alias("alice", "Alice").resolve("alice");

    assert_eq!(queued(&resolution), vec!["alice", "Alice"]);
    assert_eq!(deliverable(&resolution), vec!["alice"]);
    assert_eq!(entry(&resolution, "alice").owner().map(|o| o.uid), Some(1001));
}

#[test]
fn test_display_name_inherited_from_controller() {
    let resolution = Harness::new()
        .alias("staff", "alice, friend@example.org")
        .resolve("Staff List <staff>");

    assert_eq!(
        entry(&resolution, "friend").address.display_name.as_deref(),
        Some("Staff List")
    );
    assert_eq!(
        entry(&resolution, "alice").address.display_name.as_deref(),
        Some("Alice Liddell")
    );
}

#[test]
fn test_old_style_delimiter_flips_once() {
    let harness = Harness::new().config(|config| config.old_style_addresses = true);
    let mut resolver = harness.resolver();

    resolver.send_to("alice bob", None, QueueFlags::EMPTY);
    assert_eq!(resolver.queue().len(), 2);

    resolver.send_to("carol, dave", None, QueueFlags::EMPTY);
    assert_eq!(resolver.queue().len(), 4);

    // Modern delimiters were seen; whitespace no longer separates.
    resolver.send_to("erin bob", None, QueueFlags::EMPTY);
    let resolution = resolver.finish();
    assert_eq!(resolution.queue().len(), 5);
    assert!(entry(&resolution, "erin bob").flags.contains(QueueFlags::BAD_ADDRESS));
}

#[test]
fn test_no_alias() {
    let resolution = Harness::new()
        .alias("staff", "alice")
        .config(|config| config.no_alias = true)
        .resolve("staff");

    assert!(entry(&resolution, "staff").flags.contains(QueueFlags::BAD_ADDRESS));
}

#[test]
fn test_argv_joins_at() {
    let harness = Harness::new();
    let mut resolver = harness.resolver();
    resolver.send_to_argv(&["alice", "at", "example.org", "bob"]);
    let resolution = resolver.finish();

    assert_eq!(deliverable(&resolution), vec!["alice@example.org", "bob"]);
}

#[test]
fn test_argv_overflow() {
    let harness = Harness::new();
    let mut resolver = harness.resolver();
    let long = "x".repeat(250);
    resolver.send_to_argv(&[long.as_str(), "at", "example.org"]);
    let resolution = resolver.finish();

    assert!(messages(&resolution).contains(&"address overflow".to_string()));
    assert_eq!(resolution.queue().len(), 3);
}

#[test]
fn test_tree_navigation() {
    let resolution = Harness::new()
        .alias("staff", "alice, team")
        .alias("team", "bob, carol")
        .resolve("staff");

    let id = |user: &str| {
        resolution
            .queue()
            .iter()
            .copied()
            .find(|&id| resolution.arena()[id].address.user == user)
            .unwrap()
    };

    assert_eq!(resolution.referencing(id("staff"), id("team")), Some(id("staff")));
    assert_eq!(resolution.referencing(id("staff"), id("alice")), Some(id("team")));
    assert_eq!(resolution.referencing(id("staff"), id("bob")), Some(id("carol")));

    assert_eq!(
        resolution.render_tree(),
        "\
local staff [PRIMARY | DONT_SEND | GOOD_UID]
  local alice [GOOD_UID]
  local team [DONT_SEND]
    local bob [GOOD_UID]
    local carol [GOOD_UID]
"
    );
}

#[test]
fn test_nodes_carry_configured_timeout() {
    let resolution = Harness::new()
        .config(|config| config.queue_timeout_secs = 60)
        .resolve("alice");

    assert_eq!(entry(&resolution, "alice").timeout.as_secs(), 60);
}
