mod common;

use anyhow::Result;
use deeplink_harness::document::DocumentError;
use deeplink_harness::{
    DeeplinkSession, HarnessConfig, HarnessError, LinkDocument, LinkEntry, ObservableState,
    SimulatedDevice, SimulatedFaults,
};

use common::*;

enum Source {
    Html,
    Fixture,
}

fn session<'d>(
    device: &'d mut SimulatedDevice,
    config: HarnessConfig,
    source: Source,
    links: &[LinkEntry],
    folder: Option<&str>,
) -> DeeplinkSession<&'d mut SimulatedDevice> {
    match source {
        Source::Html => DeeplinkSession::with_entries(device, config, links, FILE_NAME, folder),
        Source::Fixture => {
            DeeplinkSession::with_file(device, config, fixture_path(), URL_FILE_NAME, folder)
                .expect("fixture document is readable")
        }
    }
}

fn check_sequence(source: Source, links: Vec<LinkEntry>, folder: Option<&str>) -> Result<()> {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    {
        let mut session = session(&mut device, config, source, &links, folder);
        session.prepare_target()?;
        assert_eq!(session.observe()?, ObservableState::default());

        let report = session.run_sequence(&links)?;
        assert!(report.is_success(), "mismatches: {:?}", report.verifications);
        assert_eq!(report.verifications.len(), links.len());
        assert!(!report.stopped_early);
    }

    let last = links.last().expect("non-empty catalog");
    assert_eq!(
        device.target_state(),
        ObservableState {
            invocation_count: links.len() as u64,
            last_link: Some(last.target.clone()),
        }
    );
    assert_eq!(device.paste_count(), 1);
    Ok(())
}

#[test]
fn html_scheme_links_in_folder() -> Result<()> {
    check_sequence(Source::Html, scheme_links(), Some(FOLDER))
}

#[test]
fn html_universal_links_in_folder() -> Result<()> {
    check_sequence(Source::Html, universal_links(), Some(FOLDER))
}

#[test]
fn html_scheme_links_at_home() -> Result<()> {
    check_sequence(Source::Html, scheme_links(), None)
}

#[test]
fn html_universal_links_at_home() -> Result<()> {
    check_sequence(Source::Html, universal_links(), None)
}

#[test]
fn file_scheme_links_in_folder() -> Result<()> {
    check_sequence(Source::Fixture, scheme_links(), Some(URL_FOLDER))
}

#[test]
fn file_universal_links_in_folder() -> Result<()> {
    check_sequence(Source::Fixture, universal_links(), Some(URL_FOLDER))
}

#[test]
fn file_scheme_links_at_home() -> Result<()> {
    check_sequence(Source::Fixture, scheme_links(), None)
}

#[test]
fn file_universal_links_at_home() -> Result<()> {
    check_sequence(Source::Fixture, universal_links(), None)
}

#[test]
fn whole_fixture_catalog_counts_every_open() -> Result<()> {
    check_sequence(Source::Fixture, all_links(), Some(URL_FOLDER))
}

#[test]
fn staging_twice_reuses_the_file() -> Result<()> {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    let links = scheme_links();

    let first = session(&mut device, config.clone(), Source::Html, &links, Some(FOLDER)).stage()?;
    assert!(!first.reused);
    let second = session(&mut device, config, Source::Html, &links, Some(FOLDER)).stage()?;
    assert!(second.reused);
    assert_eq!(first.key, second.key);

    assert_eq!(device.paste_count(), 1);
    assert_eq!(device.items(Some(FOLDER)), vec!["MyDeeplinks.html".to_string()]);
    assert_eq!(device.items(None), vec![FOLDER.to_string()]);
    Ok(())
}

#[test]
fn home_and_folder_copies_do_not_collide() -> Result<()> {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    let links = scheme_links();

    for folder in [None, Some(FOLDER), None] {
        let mut session = session(&mut device, config.clone(), Source::Html, &links, folder);
        session.prepare_target()?;
        let report = session.run_sequence(&links)?;
        assert!(report.is_success(), "mismatches in {folder:?}: {:?}", report.verifications);
    }

    assert_eq!(device.items(Some(FOLDER)), vec!["MyDeeplinks.html".to_string()]);
    assert_eq!(
        device.items(None),
        vec![FOLDER.to_string(), "MyDeeplinks.html".to_string()]
    );
    assert_eq!(device.paste_count(), 2);
    Ok(())
}

#[test]
fn existing_folder_is_entered_not_duplicated() -> Result<()> {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    device.seed_folder(FOLDER);

    let ready = session(&mut device, config, Source::Html, &scheme_links(), Some(FOLDER)).stage()?;
    assert!(!ready.reused);
    assert_eq!(device.items(None), vec![FOLDER.to_string()]);
    assert_eq!(device.items(Some(FOLDER)), vec!["MyDeeplinks.html".to_string()]);
    Ok(())
}

#[test]
fn leftovers_from_a_previous_run_are_reused() -> Result<()> {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    let links = scheme_links();
    let leftover = LinkDocument::render(&links);
    device.seed_file(Some(FOLDER), "MyDeeplinks.html", leftover.bytes());

    let mut session = session(&mut device, config, Source::Html, &links, Some(FOLDER));
    session.prepare_target()?;
    let report = session.run_sequence(&links)?;
    assert!(report.is_success());
    drop(session);

    assert_eq!(device.paste_count(), 0);
    assert_eq!(device.items(Some(FOLDER)).len(), 1);
    Ok(())
}

#[test]
fn open_document_from_another_folder_is_not_trusted() -> Result<()> {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    let links = scheme_links();

    let mut first = session(&mut device, config.clone(), Source::Html, &links, Some(FOLDER));
    first.prepare_target()?;
    first.open_deeplink(&links[0].name)?;
    drop(first);
    assert_eq!(device.open_document_title(), Some(FILE_NAME));

    let mut second = session(&mut device, config, Source::Html, &links, Some(URL_FOLDER));
    second.open_deeplink(&links[1].name)?;
    drop(second);

    assert_eq!(device.paste_count(), 2);
    assert!(device
        .file_contents(Some(URL_FOLDER), "MyDeeplinks.html")
        .is_some());
    assert_eq!(
        device.target_state(),
        ObservableState {
            invocation_count: 2,
            last_link: Some(links[1].target.clone()),
        }
    );
    Ok(())
}

#[test]
fn reopens_the_document_when_the_viewer_closes_it() -> Result<()> {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config).with_faults(SimulatedFaults {
        close_document_on_handoff: true,
        ..SimulatedFaults::default()
    });
    let links = universal_links();

    let mut session = session(&mut device, config, Source::Html, &links, Some(FOLDER));
    session.prepare_target()?;
    let report = session.run_sequence(&links)?;
    assert!(report.is_success());
    drop(session);

    assert_eq!(device.paste_count(), 1);
    Ok(())
}

#[test]
fn removing_missing_items_is_a_no_op() -> Result<()> {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    let mut session = session(&mut device, config, Source::Html, &scheme_links(), None);

    assert!(!session.remove_element("Nothing here", false)?);
    assert!(!session.remove_element("_Nowhere_", true)?);
    Ok(())
}

#[test]
fn removes_staged_files_and_folders() -> Result<()> {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    let links = scheme_links();

    session(&mut device, config.clone(), Source::Html, &links, None).stage()?;
    session(&mut device, config.clone(), Source::Html, &links, Some(FOLDER)).stage()?;
    assert_eq!(
        device.items(None),
        vec![FOLDER.to_string(), "MyDeeplinks.html".to_string()]
    );

    let mut cleanup = session(&mut device, config, Source::Html, &links, None);
    assert!(cleanup.remove_element(FILE_NAME, false)?);
    assert!(cleanup.remove_element(FOLDER, true)?);
    drop(cleanup);

    assert!(device.items(None).is_empty());
    assert!(!device.has_folder(FOLDER));
    Ok(())
}

#[test]
fn lost_paste_is_a_staging_timeout() {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config).with_faults(SimulatedFaults {
        drop_pastes: true,
        ..SimulatedFaults::default()
    });
    let links = scheme_links();

    let err = session(&mut device, config, Source::Html, &links, Some(FOLDER))
        .open_deeplink(&links[0].name)
        .unwrap_err();
    match err {
        HarnessError::StagingTimeout { file, .. } => assert_eq!(file, "MyDeeplinks.html"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(device.paste_count(), 1);
    assert_eq!(device.target_state(), ObservableState::default());
}

#[test]
fn missing_anchor_is_reported_by_name() {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config).with_faults(SimulatedFaults {
        strip_anchor: Some("Activate premium by scheme".into()),
        ..SimulatedFaults::default()
    });
    let links = scheme_links();

    let mut session = session(&mut device, config, Source::Html, &links, Some(FOLDER));
    session.prepare_target().unwrap();
    session.open_deeplink(&links[0].name).unwrap();
    let err = session.open_deeplink(&links[1].name).unwrap_err();
    match err {
        HarnessError::LinkNotFound { name, document, .. } => {
            assert_eq!(name, "Activate premium by scheme");
            assert_eq!(document, FILE_NAME);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_prompt_is_a_prompt_timeout() {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config).with_faults(SimulatedFaults {
        suppress_prompt: true,
        ..SimulatedFaults::default()
    });
    let links = scheme_links();

    let mut session = session(&mut device, config, Source::Html, &links, None);
    let err = session.open_deeplink(&links[0].name).unwrap_err();
    assert!(
        matches!(&err, HarnessError::PromptTimeout { link, .. } if link == "Show settings by scheme"),
        "unexpected error: {err}"
    );
}

#[test]
fn target_that_never_appears_is_a_launch_timeout() {
    let config = fast_config();
    let target = config.target.bundle_id.clone();
    let mut device = SimulatedDevice::new(&config);
    device.faults_mut().block_launch = true;
    let links = scheme_links();

    let mut session = session(&mut device, config, Source::Html, &links, Some(FOLDER));
    session.prepare_target().unwrap();
    let err = session.open_deeplink(&links[0].name).unwrap_err();
    assert!(
        matches!(&err, HarnessError::LaunchTimeout { bundle_id, .. } if *bundle_id == target),
        "unexpected error: {err}"
    );
}

#[test]
fn mismatches_are_recorded_and_the_run_continues() -> Result<()> {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    let links = scheme_links();

    let mut session = session(&mut device, config, Source::Html, &links, Some(FOLDER));
    session.prepare_target()?;
    // An extra open the sequence does not know about shifts every count.
    session.open_deeplink(&links[1].name)?;

    let report = session.run_sequence(&links)?;
    assert!(!report.is_success());
    assert!(!report.stopped_early);
    assert_eq!(report.verifications.len(), 2);

    let mismatches: Vec<_> = report.mismatches().collect();
    assert_eq!(mismatches.len(), 2);
    assert_eq!(mismatches[0].1.expected, "1");
    assert_eq!(mismatches[0].1.actual, "2");
    assert_eq!(mismatches[1].0.ordinal, 2);
    assert_eq!(mismatches[1].1.actual, "3");
    Ok(())
}

#[test]
fn stop_on_first_failure_ends_the_run() -> Result<()> {
    let mut config = fast_config();
    config.stop_on_first_failure = true;
    let mut device = SimulatedDevice::new(&config);
    let links = scheme_links();

    let mut session = session(&mut device, config, Source::Html, &links, Some(FOLDER));
    session.prepare_target()?;
    session.open_deeplink(&links[0].name)?;

    let report = session.run_sequence(&links)?;
    assert!(report.stopped_early);
    assert_eq!(report.verifications.len(), 1);
    drop(session);

    assert_eq!(device.target_state().invocation_count, 2);
    Ok(())
}

#[test]
fn catalog_drift_fails_before_touching_the_device() {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    let drifted = vec![LinkEntry::new("Show settings by scheme", "testdeeplink://other")];

    let mut session = session(&mut device, config, Source::Html, &scheme_links(), None);
    let err = session.run_sequence(&drifted).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Document(DocumentError::TargetMismatch { .. })
    ));
    drop(session);
    assert_eq!(device.paste_count(), 0);
}

#[test]
fn unreadable_file_yields_no_session() {
    let config = fast_config();
    let mut device = SimulatedDevice::new(&config);
    let session = DeeplinkSession::with_file(
        &mut device,
        config,
        fixture_path().with_file_name("missing.html"),
        URL_FILE_NAME,
        Some(URL_FOLDER),
    );
    assert!(session.is_none());
}
