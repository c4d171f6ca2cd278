//! Rendering of actions into backend steps.
//!
//! Pure mapping; no decisions are made here beyond argument order and
//! variable naming. Conventions per action:
//!
//! | Action              | Steps                                      | Environment                                   |
//! |---------------------|--------------------------------------------|-----------------------------------------------|
//! | `FetchBaseImage`    | `base-image`                               | none                                          |
//! | `BuildProjectImage` | `project-image-<platform>`                 | `BASE_IMAGE`, `DOCKERFILE`, `IMAGE`, `PLATFORM` |
//! | `Compile`           | `compile-<tag>`                            | `FUZZING_ENGINE`, `SANITIZER`, `ARCHITECTURE`, `FUZZING_LANGUAGE`, build flags |
//! | `Upload`            | `archive-<tag>`, `upload-<tag>`, `upload-latest-<tag>` | `OUT_DIR`, `ARCHIVE` on the archive step |
//! | `TagPush`           | `tag-<tag>`, `push-<tag>`                  | none                                          |

use indexmap::IndexMap;

use super::action::{Action, ActionDescriptor};
use super::types::BuildStep;

/// Feeds the Dockerfile from the environment to `docker build` on stdin.
pub const BUILD_IMAGE_SCRIPT: &str =
  "printf '%s' \"$DOCKERFILE\" | docker build --platform \"$PLATFORM\" --build-arg BASE_IMAGE --tag \"$IMAGE\" --file - .";

/// Zips a variant's output directory.
pub const ARCHIVE_SCRIPT: &str = "cd \"$OUT_DIR\" && zip -r \"$ARCHIVE\" .";

const CURL_PUT: &[&str] = &["curl", "--fail", "--silent", "--show-error", "--request", "PUT"];

fn strings(args: &[&str]) -> Vec<String> {
  args.iter().map(|s| s.to_string()).collect()
}

fn env<const N: usize>(pairs: [(&str, &str); N]) -> IndexMap<String, String> {
  pairs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Render one action into its steps.
///
/// The first step depends on the descriptor's dependencies; each later step
/// depends on the step before it.
pub fn render(descriptor: &ActionDescriptor) -> Vec<BuildStep> {
  let bodies = render_bodies(&descriptor.action);
  let names = descriptor.action.step_names();

  let mut steps = Vec::with_capacity(bodies.len());
  let mut depends_on = descriptor.depends_on.clone();
  for (name, (args, env)) in names.into_iter().zip(bodies) {
    steps.push(BuildStep {
      name: name.clone(),
      args,
      env,
      timeout: descriptor.timeout,
      depends_on,
    });
    depends_on = vec![name];
  }
  steps
}

fn render_bodies(action: &Action) -> Vec<(Vec<String>, IndexMap<String, String>)> {
  match action {
    Action::FetchBaseImage { image } => vec![(strings(&["docker", "pull", image.as_str()]), IndexMap::new())],

    Action::BuildProjectImage {
      platform,
      image,
      base_image,
      dockerfile,
    } => vec![(
      strings(&["bash", "-c", BUILD_IMAGE_SCRIPT]),
      env([
        ("BASE_IMAGE", base_image.as_str()),
        ("DOCKERFILE", dockerfile.as_str()),
        ("IMAGE", image.as_str()),
        ("PLATFORM", platform.docker()),
      ]),
    )],

    Action::Compile {
      variant,
      language,
      platform,
      image,
      out_dir,
      build_flags,
    } => {
      let mut vars = env([
        ("FUZZING_ENGINE", variant.engine.as_str()),
        ("SANITIZER", variant.sanitizer.as_str()),
        ("ARCHITECTURE", variant.architecture.as_str()),
        ("FUZZING_LANGUAGE", language.as_str()),
      ]);
      vars.extend(build_flags.iter().map(|(k, v)| (k.clone(), v.clone())));

      let mut args = strings(&["docker", "run", "--rm", "--platform", platform.docker(), "--volume"]);
      args.push(format!("{}:/out", out_dir));
      for name in vars.keys() {
        args.push("--env".to_string());
        args.push(name.clone());
      }
      args.push(image.clone());
      args.push("compile".to_string());

      vec![(args, vars)]
    }

    Action::Upload {
      out_dir,
      archive_path,
      archive_name,
      archive_url,
      latest_url,
      ..
    } => {
      let archive = (
        strings(&["bash", "-c", ARCHIVE_SCRIPT]),
        env([("OUT_DIR", out_dir.as_str()), ("ARCHIVE", archive_path.as_str())]),
      );

      let mut upload = strings(CURL_PUT);
      upload.extend(strings(&[
        "--header",
        "Content-Type: application/zip",
        "--upload-file",
        archive_path.as_str(),
        archive_url.as_str(),
      ]));

      let mut latest = strings(CURL_PUT);
      latest.extend(strings(&[
        "--header",
        "Content-Type: text/plain",
        "--data",
        archive_name.as_str(),
        latest_url.as_str(),
      ]));

      vec![archive, (upload, IndexMap::new()), (latest, IndexMap::new())]
    }

    Action::TagPush {
      source_image,
      target_image,
      ..
    } => vec![
      (strings(&["docker", "tag", source_image.as_str(), target_image.as_str()]), IndexMap::new()),
      (strings(&["docker", "push", target_image.as_str()]), IndexMap::new()),
    ],
  }
}
