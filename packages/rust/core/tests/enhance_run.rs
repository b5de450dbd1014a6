//! End-to-end enhancement runs against temporary class directories.

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use classweave_classfile::{ClassFile, ClassFileBuilder, access};
use classweave_core::{
    ArtifactWriter, EnhanceConfig, FsWriter, SilentProgress, run, run_with_writer,
};
use classweave_enhancers::{
    EnhanceContext, Enhancer, EnhancerCatalog, EnhancerRegistry, ImplementInterfaceEnhancer,
    InjectFieldEnhancer,
};
use classweave_loader::ArtifactDescription;
use classweave_shared::{ClassweaveError, EligibilityClass, EnhancerFailure};

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "cw-enhance-run-{}",
        uuid::Uuid::now_v7()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_file(root: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, bytes).unwrap();
    path
}

fn write_class(root: &Path, internal: &str) -> PathBuf {
    let bytes = ClassFileBuilder::new(internal).build().unwrap();
    write_file(root, &format!("{internal}.class"), &bytes)
}

fn config(classes: &Path) -> EnhanceConfig {
    EnhanceConfig {
        classes_dir: classes.to_path_buf(),
        classpath: vec![],
        recurse: true,
        encoding: "utf-8".into(),
        enhancers: vec![],
    }
}

fn parse(path: &Path) -> ClassFile {
    ClassFile::parse(&std::fs::read(path).unwrap()).unwrap()
}

/// Filesystem writer that records every call and can fail the first few.
#[derive(Default)]
struct RecordingWriter {
    calls: Vec<PathBuf>,
    fail_first: usize,
}

impl ArtifactWriter for RecordingWriter {
    fn write(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.calls.push(path.to_path_buf());
        if self.fail_first > 0 {
            self.fail_first -= 1;
            return Err(io::Error::other("disk full"));
        }
        FsWriter.write(path, bytes)
    }
}

/// Records the name of every artifact it is handed.
struct Recorder(Rc<RefCell<Vec<String>>>);

impl Enhancer for Recorder {
    fn id(&self) -> &str {
        "recorder"
    }
    fn version(&self) -> &str {
        "0.1.0"
    }
    fn enhance(
        &self,
        artifact: &mut ArtifactDescription,
        _ctx: &EnhanceContext<'_>,
    ) -> std::result::Result<(), EnhancerFailure> {
        self.0.borrow_mut().push(artifact.name().to_string());
        Ok(())
    }
}

/// Fails on one binary name, passes everything else through untouched.
struct FailOn(&'static str);

impl Enhancer for FailOn {
    fn id(&self) -> &str {
        "fail-on"
    }
    fn version(&self) -> &str {
        "2.3.1"
    }
    fn enhance(
        &self,
        artifact: &mut ArtifactDescription,
        _ctx: &EnhanceContext<'_>,
    ) -> std::result::Result<(), EnhancerFailure> {
        if artifact.name().as_str() == self.0 {
            return Err("unsupported bytecode".into());
        }
        Ok(())
    }
}

/// Asks the loader about the artifact it is currently enhancing.
struct InspectSelf;

impl Enhancer for InspectSelf {
    fn id(&self) -> &str {
        "inspect-self"
    }
    fn version(&self) -> &str {
        "0.1.0"
    }
    fn enhance(
        &self,
        artifact: &mut ArtifactDescription,
        ctx: &EnhanceContext<'_>,
    ) -> std::result::Result<(), EnhancerFailure> {
        ctx.loader.inspect(artifact.name())?;
        Ok(())
    }
}

#[test]
fn missing_root_names_path_and_cwd() {
    let missing = std::env::temp_dir().join(format!("cw-missing-{}", uuid::Uuid::now_v7()));
    let mut writer = RecordingWriter::default();
    let registry = EnhancerRegistry::from_enhancers(vec![Box::new(FailOn("never"))]);

    let err = run_with_writer(&config(&missing), &registry, &mut writer, &SilentProgress)
        .unwrap_err();

    assert!(matches!(err, ClassweaveError::Config { .. }));
    let message = err.to_string();
    assert!(message.contains(&missing.display().to_string()));
    let cwd = std::env::current_dir().unwrap();
    assert!(message.contains(&cwd.display().to_string()));
    assert!(writer.calls.is_empty());
}

#[test]
fn visits_only_binary_artifacts() {
    let tmp = temp_dir();
    write_class(&tmp, "Top");
    write_class(&tmp, "com/example/User");
    write_class(&tmp, "com/example/deep/Address");
    write_file(&tmp, "Top.java", b"not a class file");
    write_file(&tmp, "com/example/User.java", b"class User {}");
    write_file(&tmp, "META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n");

    let seen = Rc::new(RefCell::new(Vec::new()));
    let registry = EnhancerRegistry::from_enhancers(vec![Box::new(Recorder(seen.clone()))]);
    let mut writer = RecordingWriter::default();

    let summary =
        run_with_writer(&config(&tmp), &registry, &mut writer, &SilentProgress).unwrap();

    assert_eq!(summary.visited, 3);
    assert_eq!(summary.source_files_skipped, 2);
    assert_eq!(
        *seen.borrow(),
        ["Top", "com.example.User", "com.example.deep.Address"]
    );
    assert_eq!(summary.cache.misses, 3);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn no_recurse_stays_at_top_level() {
    let tmp = temp_dir();
    write_class(&tmp, "Top");
    write_class(&tmp, "com/example/User");

    let registry = EnhancerRegistry::from_enhancers(vec![Box::new(FailOn("never"))]);
    let mut writer = RecordingWriter::default();
    let mut config = config(&tmp);
    config.recurse = false;

    let summary = run_with_writer(&config, &registry, &mut writer, &SilentProgress).unwrap();
    assert_eq!(summary.visited, 1);
    assert_eq!(writer.calls, [tmp.join("Top.class")]);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn ineligible_artifacts_are_never_enhanced_or_written() {
    let tmp = temp_dir();
    let concrete = write_class(&tmp, "com/example/User");
    let fixtures = [
        ("com/example/Repo", ClassFileBuilder::interface_type("com/example/Repo")),
        ("com/example/Color", ClassFileBuilder::enum_type("com/example/Color")),
        ("com/example/Marker", ClassFileBuilder::annotation_type("com/example/Marker")),
        (
            "com/example/package-info",
            ClassFileBuilder::interface_type("com/example/package-info"),
        ),
        (
            "module-info",
            ClassFileBuilder::new("module-info")
                .access(access::MODULE)
                .no_super_class(),
        ),
    ];
    let mut untouched = Vec::new();
    for (rel, builder) in fixtures {
        let bytes = builder.build().unwrap();
        untouched.push((write_file(&tmp, &format!("{rel}.class"), &bytes), bytes));
    }

    let seen = Rc::new(RefCell::new(Vec::new()));
    let registry = EnhancerRegistry::from_enhancers(vec![
        Box::new(Recorder(seen.clone())),
        Box::new(InjectFieldEnhancer::new("_v", "I", access::PRIVATE)),
    ]);
    let mut writer = RecordingWriter::default();

    let summary =
        run_with_writer(&config(&tmp), &registry, &mut writer, &SilentProgress).unwrap();

    assert_eq!(*seen.borrow(), ["com.example.User"]);
    assert!(writer.calls.iter().all(|p| *p == concrete));
    for (path, bytes) in untouched {
        assert_eq!(std::fs::read(&path).unwrap(), bytes, "{}", path.display());
    }
    assert_eq!(summary.skipped.get(&EligibilityClass::Interface), Some(&1));
    assert_eq!(summary.skipped.get(&EligibilityClass::Enum), Some(&1));
    assert_eq!(summary.skipped.get(&EligibilityClass::Annotation), Some(&1));
    assert_eq!(summary.skipped.get(&EligibilityClass::PackageMarker), Some(&2));
    assert_eq!(summary.skipped_total(), 5);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn later_enhancer_sees_earlier_effects_and_each_step_is_written() {
    let tmp = temp_dir();
    let user = write_class(&tmp, "com/example/User");

    let registry = EnhancerRegistry::from_enhancers(vec![
        Box::new(InjectFieldEnhancer::new("_tracked", "Z", access::PRIVATE)),
        Box::new(ImplementInterfaceEnhancer::new("com.example.Tracked").when_field("_tracked")),
    ]);
    let mut writer = RecordingWriter::default();

    let summary =
        run_with_writer(&config(&tmp), &registry, &mut writer, &SilentProgress).unwrap();

    assert_eq!(writer.calls, [user.clone(), user.clone()]);
    assert_eq!(summary.writes, 2);
    let class = parse(&user);
    assert!(class.has_field("_tracked"));
    assert!(class.implements("com/example/Tracked"));

    assert_eq!(summary.timings.len(), 2);
    assert_eq!(summary.timings[0].id, "inject-field");
    assert_eq!(summary.timings[1].id, "implement-interface");
    assert!(summary.timings.iter().all(|t| t.invocations == 1));
    assert!(summary.artifacts[0].modified);
    assert_eq!(summary.artifacts[0].sha256.len(), 64);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[cfg(unix)]
#[test]
fn symlinked_packages_and_class_files_are_enhanced_in_place() {
    let tmp = temp_dir();
    let shared = temp_dir();
    let linked = write_class(&shared, "com/ext/Linked");
    let aliased = write_class(&shared, "com/example/Alias");
    std::fs::create_dir_all(tmp.join("com/example")).unwrap();
    std::os::unix::fs::symlink(shared.join("com/ext"), tmp.join("com/ext")).unwrap();
    std::os::unix::fs::symlink(&aliased, tmp.join("com/example/Alias.class")).unwrap();

    let registry = EnhancerRegistry::from_enhancers(vec![Box::new(InjectFieldEnhancer::new(
        "_tracked",
        "Z",
        access::PRIVATE,
    ))]);
    let mut writer = RecordingWriter::default();

    let summary =
        run_with_writer(&config(&tmp), &registry, &mut writer, &SilentProgress).unwrap();

    assert_eq!(summary.visited, 2);
    assert_eq!(summary.enhanced, 2);
    assert!(summary.persistence_warnings.is_empty());
    let alias_link = std::fs::symlink_metadata(tmp.join("com/example/Alias.class")).unwrap();
    assert!(alias_link.file_type().is_symlink());
    assert!(parse(&aliased).has_field("_tracked"));
    assert!(parse(&linked).has_field("_tracked"));

    let _ = std::fs::remove_dir_all(&tmp);
    let _ = std::fs::remove_dir_all(&shared);
}

#[test]
fn failed_write_does_not_stop_the_chain_and_is_recovered() {
    let tmp = temp_dir();
    let user = write_class(&tmp, "com/example/User");
    let original = std::fs::read(&user).unwrap();

    let registry = EnhancerRegistry::from_enhancers(vec![
        Box::new(InjectFieldEnhancer::new("_a", "I", access::PRIVATE)),
        Box::new(InjectFieldEnhancer::new("_b", "I", access::PRIVATE)),
    ]);
    let mut writer = RecordingWriter {
        fail_first: 1,
        ..RecordingWriter::default()
    };

    let summary =
        run_with_writer(&config(&tmp), &registry, &mut writer, &SilentProgress).unwrap();

    assert_eq!(writer.calls.len(), 2);
    assert_ne!(std::fs::read(&user).unwrap(), original);
    let class = parse(&user);
    assert!(class.has_field("_a"));
    assert!(class.has_field("_b"));

    assert_eq!(summary.persistence_warnings.len(), 1);
    assert!(summary.persistence_warnings[0].recovered);
    assert_eq!(summary.lost_writes().count(), 0);
    assert!(summary.artifacts[0].persisted);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn unrecovered_write_failure_is_reported() {
    let tmp = temp_dir();
    let user = write_class(&tmp, "com/example/User");
    let original = std::fs::read(&user).unwrap();

    let registry = EnhancerRegistry::from_enhancers(vec![Box::new(InjectFieldEnhancer::new(
        "_a",
        "I",
        access::PRIVATE,
    ))]);
    let mut writer = RecordingWriter {
        fail_first: 1,
        ..RecordingWriter::default()
    };

    let summary =
        run_with_writer(&config(&tmp), &registry, &mut writer, &SilentProgress).unwrap();

    assert_eq!(std::fs::read(&user).unwrap(), original);
    assert_eq!(summary.lost_writes().count(), 1);
    assert!(!summary.artifacts[0].persisted);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn enhancer_failure_aborts_remaining_walk() {
    let tmp = temp_dir();
    let a = write_class(&tmp, "a/A");
    let b = write_class(&tmp, "b/B");
    let c = write_class(&tmp, "c/C");
    let c_before = std::fs::read(&c).unwrap();

    let registry = EnhancerRegistry::from_enhancers(vec![
        Box::new(InjectFieldEnhancer::new("_v", "I", access::PRIVATE)),
        Box::new(FailOn("b.B")),
    ]);
    let mut writer = RecordingWriter::default();

    let err = run_with_writer(&config(&tmp), &registry, &mut writer, &SilentProgress)
        .unwrap_err();

    let ClassweaveError::Transform { file, source } = err else {
        panic!("expected a transform error");
    };
    assert_eq!(file, Path::new("b").join("B.class").display().to_string());
    match *source {
        ClassweaveError::Enhancement {
            enhancer,
            version,
            class_name,
            source,
        } => {
            assert_eq!(enhancer, "fail-on");
            assert_eq!(version, "2.3.1");
            assert_eq!(class_name, "b.B");
            assert_eq!(source.to_string(), "unsupported bytecode");
        }
        other => panic!("unexpected cause: {other}"),
    }

    assert_eq!(writer.calls, [a.clone(), a, b]);
    assert_eq!(std::fs::read(&c).unwrap(), c_before);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn local_output_root_shadows_dependency() {
    let tmp = temp_dir();
    let classes = tmp.join("classes");
    let dep = tmp.join("dep");
    let local = write_class(&classes, "com/example/User");
    let dep_bytes = ClassFileBuilder::new("com/example/User")
        .field(access::PRIVATE, "fromDependency", "I")
        .build()
        .unwrap();
    let dep_user = write_file(&dep, "com/example/User.class", &dep_bytes);

    let registry = EnhancerRegistry::from_enhancers(vec![Box::new(InjectFieldEnhancer::new(
        "_v",
        "I",
        access::PRIVATE,
    ))]);
    let mut writer = RecordingWriter::default();
    let mut config = config(&classes);
    config.classpath = vec![dep.clone()];

    let summary = run_with_writer(&config, &registry, &mut writer, &SilentProgress).unwrap();

    assert_eq!(writer.calls, [local.clone()]);
    assert_eq!(summary.artifacts[0].path, local);
    let class = parse(&local);
    assert!(class.has_field("_v"));
    assert!(!class.has_field("fromDependency"));
    assert_eq!(std::fs::read(&dep_user).unwrap(), dep_bytes);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn interface_from_archive_dependency_resolves() {
    use std::io::Write as _;
    use zip::write::SimpleFileOptions;

    let tmp = temp_dir();
    let classes = tmp.join("classes");
    let user = write_class(&classes, "com/example/User");

    let jar = tmp.join("api.jar");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&jar).unwrap());
    zip.start_file("com/lib/Tracked.class", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(&ClassFileBuilder::interface_type("com/lib/Tracked").build().unwrap())
        .unwrap();
    zip.finish().unwrap();

    let registry = EnhancerRegistry::from_enhancers(vec![Box::new(
        ImplementInterfaceEnhancer::new("com.lib.Tracked").require_resolvable(true),
    )]);
    let mut writer = RecordingWriter::default();
    let mut config = config(&classes);
    config.classpath = vec![jar];

    run_with_writer(&config, &registry, &mut writer, &SilentProgress).unwrap();
    assert!(parse(&user).implements("com/lib/Tracked"));

    let registry = EnhancerRegistry::from_enhancers(vec![Box::new(
        ImplementInterfaceEnhancer::new("com.lib.Missing").require_resolvable(true),
    )]);
    let err = run_with_writer(&config, &registry, &mut writer, &SilentProgress).unwrap_err();
    let chain = std::iter::successors(
        Some(&err as &dyn std::error::Error),
        |e| e.source(),
    )
    .map(ToString::to_string)
    .collect::<Vec<_>>();
    assert!(chain[1].contains("implement-interface"));
    assert!(chain[2].contains("com.lib.Missing is not on the classpath"));

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn inspecting_the_artifact_under_enhancement_is_refused() {
    let tmp = temp_dir();
    write_class(&tmp, "com/example/User");

    let registry = EnhancerRegistry::from_enhancers(vec![Box::new(InspectSelf)]);
    let mut writer = RecordingWriter::default();

    let err = run_with_writer(&config(&tmp), &registry, &mut writer, &SilentProgress)
        .unwrap_err();
    let ClassweaveError::Transform { source, .. } = err else {
        panic!("expected a transform error");
    };
    let ClassweaveError::Enhancement { source, .. } = *source else {
        panic!("expected an enhancement error");
    };
    assert!(source.to_string().contains("com.example.User is being enhanced"));
    assert!(writer.calls.is_empty());

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn summary_serializes_to_json() {
    let tmp = temp_dir();
    write_class(&tmp, "com/example/User");
    write_file(
        &tmp,
        "com/example/Repo.class",
        &ClassFileBuilder::interface_type("com/example/Repo").build().unwrap(),
    );

    let summary = run(&config(&tmp), &EnhancerCatalog::with_builtins(), &SilentProgress)
        .unwrap();
    let json = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["visited"], 2);
    assert_eq!(json["enhanced"], 1);
    assert_eq!(json["skipped"]["interface"], 1);
    assert!(json["run_id"].is_string());

    let _ = std::fs::remove_dir_all(&tmp);
}
