//! Built-in technology stacks.
//!
//! Each [`Stack`] becomes one project type. A stack is recognized by its
//! manifest files; its framework is inferred from markers in the manifest
//! content. Table order is detection priority: specific manifests before
//! generic ones.

use std::collections::HashSet;
use std::fs;

use canopy_core::vfs::FolderEntry;
use serde::Serialize;

use crate::DetectError;

/// Coarse category of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Backend,
    Frontend,
    Mobile,
    Ml,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Backend => "backend",
            Category::Frontend => "frontend",
            Category::Mobile => "mobile",
            Category::Ml => "ml",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Manifest {
    /// Exact file name in the project root.
    File(&'static str),
    /// Any root entry whose name ends with the suffix.
    Suffix(&'static str),
}

/// How framework markers are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerScan {
    /// Case-insensitive substring search in the manifest text.
    Text,
    /// Exact dependency names from `package.json`.
    PackageJson,
}

#[derive(Debug, Clone, Copy)]
pub struct Framework {
    pub name: &'static str,
    pub markers: &'static [&'static str],
    pub category: Category,
}

const fn fw(name: &'static str, markers: &'static [&'static str], category: Category) -> Framework {
    Framework {
        name,
        markers,
        category,
    }
}

#[derive(Debug)]
pub struct Stack {
    pub id: &'static str,
    pub display_name: &'static str,
    pub language: &'static str,
    pub parent: Option<&'static str>,
    pub manifests: &'static [Manifest],
    pub scan: MarkerScan,
    pub frameworks: &'static [Framework],
    pub default_category: Category,
}

/// What a stack found in one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub framework: Option<&'static str>,
    pub category: Category,
}

use Category::{Backend, Frontend, Ml, Mobile};
use Manifest::{File, Suffix};

pub static STACKS: &[Stack] = &[
    Stack {
        id: "php",
        display_name: "PHP",
        language: "PHP",
        parent: None,
        manifests: &[File("composer.json")],
        scan: MarkerScan::Text,
        frameworks: &[
            fw("Laravel", &["laravel/framework"], Backend),
            fw("Symfony", &["symfony/symfony", "symfony/framework-bundle"], Backend),
            fw("WordPress", &["roots/sage", "johnpbloch/wordpress"], Backend),
            fw("Slim", &["slim/slim"], Backend),
            fw("CakePHP", &["cakephp/cakephp"], Backend),
        ],
        default_category: Backend,
    },
    Stack {
        id: "dart",
        display_name: "Dart",
        language: "Dart",
        parent: None,
        manifests: &[File("pubspec.yaml")],
        scan: MarkerScan::Text,
        frameworks: &[fw("Flutter", &["sdk: flutter"], Mobile)],
        default_category: Backend,
    },
    Stack {
        id: "rust",
        display_name: "Rust",
        language: "Rust",
        parent: None,
        manifests: &[File("Cargo.toml")],
        scan: MarkerScan::Text,
        frameworks: &[
            fw("Actix Web", &["actix-web", "actix_web"], Backend),
            fw("Axum", &["\"axum\"", "axum ="], Backend),
            fw("Tauri", &["tauri"], Frontend),
            fw("Leptos", &["leptos"], Frontend),
            fw("Rocket", &["rocket"], Backend),
        ],
        default_category: Backend,
    },
    Stack {
        id: "go",
        display_name: "Go",
        language: "Go",
        parent: None,
        manifests: &[File("go.mod")],
        scan: MarkerScan::Text,
        frameworks: &[
            fw("Gin", &["gin-gonic/gin"], Backend),
            fw("Echo", &["labstack/echo"], Backend),
            fw("Fiber", &["gofiber/fiber"], Backend),
            fw("Chi", &["go-chi/chi"], Backend),
        ],
        default_category: Backend,
    },
    Stack {
        id: "elixir",
        display_name: "Elixir",
        language: "Elixir",
        parent: None,
        manifests: &[File("mix.exs")],
        scan: MarkerScan::Text,
        frameworks: &[fw("Phoenix", &[":phoenix", "\"phoenix\""], Backend)],
        default_category: Backend,
    },
    Stack {
        id: "kotlin",
        display_name: "Kotlin (Gradle)",
        language: "Kotlin",
        parent: None,
        manifests: &[File("build.gradle.kts")],
        scan: MarkerScan::Text,
        frameworks: &[
            fw("Spring Boot", &["spring-boot", "springframework"], Backend),
            fw("Ktor", &["io.ktor"], Backend),
        ],
        default_category: Backend,
    },
    Stack {
        id: "java",
        display_name: "Java",
        language: "Java",
        parent: None,
        manifests: &[File("pom.xml"), File("build.gradle")],
        scan: MarkerScan::Text,
        frameworks: &[
            fw("Spring Boot", &["spring-boot", "springframework"], Backend),
            fw("Quarkus", &["quarkus"], Backend),
            fw("Micronaut", &["micronaut"], Backend),
        ],
        default_category: Backend,
    },
    Stack {
        id: "dotnet",
        display_name: ".NET",
        language: "C#",
        parent: None,
        manifests: &[Suffix(".csproj"), Suffix(".fsproj"), Suffix(".sln")],
        scan: MarkerScan::Text,
        frameworks: &[
            fw("MAUI", &["maui"], Mobile),
            fw("Blazor", &["blazor", "microsoft.aspnetcore.components"], Frontend),
            fw("ASP.NET Core", &["microsoft.aspnetcore"], Backend),
        ],
        default_category: Backend,
    },
    Stack {
        id: "ruby",
        display_name: "Ruby",
        language: "Ruby",
        parent: None,
        manifests: &[File("Gemfile")],
        scan: MarkerScan::Text,
        frameworks: &[
            fw("Rails", &["\"rails\"", "'rails'"], Backend),
            fw("Sinatra", &["sinatra"], Backend),
            fw("Hanami", &["hanami"], Backend),
        ],
        default_category: Backend,
    },
    Stack {
        id: "swift",
        display_name: "Swift",
        language: "Swift",
        parent: None,
        manifests: &[File("Package.swift"), Suffix(".xcodeproj")],
        scan: MarkerScan::Text,
        frameworks: &[fw("Vapor", &["vapor"], Backend), fw("SwiftUI", &["swiftui"], Mobile)],
        default_category: Mobile,
    },
    Stack {
        id: "node",
        display_name: "Node.js",
        language: "JavaScript",
        parent: None,
        manifests: &[File("package.json")],
        scan: MarkerScan::PackageJson,
        frameworks: &[
            fw("Next.js", &["next"], Frontend),
            fw("Nuxt", &["nuxt", "nuxt3"], Frontend),
            fw("Remix", &["@remix-run/react", "@remix-run/node"], Frontend),
            fw("Astro", &["astro"], Frontend),
            fw("Angular", &["@angular/core"], Frontend),
            fw("SvelteKit", &["@sveltejs/kit"], Frontend),
            fw("Svelte", &["svelte"], Frontend),
            fw("Vue", &["vue"], Frontend),
            fw("React", &["react"], Frontend),
            fw("NestJS", &["@nestjs/core"], Backend),
            fw("Express", &["express"], Backend),
            fw("Fastify", &["fastify"], Backend),
            fw("Koa", &["koa"], Backend),
        ],
        default_category: Backend,
    },
    Stack {
        id: "typescript",
        display_name: "TypeScript",
        language: "TypeScript",
        parent: Some("node"),
        manifests: &[File("tsconfig.json")],
        scan: MarkerScan::Text,
        frameworks: &[],
        default_category: Backend,
    },
    Stack {
        id: "python",
        display_name: "Python",
        language: "Python",
        parent: None,
        manifests: &[
            File("requirements.txt"),
            File("pyproject.toml"),
            File("Pipfile"),
            File("setup.py"),
        ],
        scan: MarkerScan::Text,
        frameworks: &[
            fw("FastAPI", &["fastapi"], Backend),
            fw("Django", &["django"], Backend),
            fw("Flask", &["flask"], Backend),
            fw("Streamlit", &["streamlit"], Ml),
            fw("PyTorch", &["torch"], Ml),
            fw("TensorFlow", &["tensorflow", "keras"], Ml),
            fw("scikit-learn", &["scikit-learn", "sklearn"], Ml),
        ],
        default_category: Backend,
    },
];

pub fn find(id: &str) -> Option<&'static Stack> {
    STACKS.iter().find(|s| s.id == id)
}

impl Stack {
    /// True when any manifest is present in `folder`.
    pub fn recognizes(&self, folder: &FolderEntry) -> bool {
        self.manifests.iter().any(|m| match m {
            File(name) => folder.has_child(name),
            Suffix(suffix) => !suffix_entries(folder, suffix).is_empty(),
        })
    }

    /// Inspect `folder`. `None` when no manifest is present.
    pub fn inspect(&self, folder: &FolderEntry) -> Result<Option<Inspection>, DetectError> {
        let Some(content) = self.manifest_text(folder)? else {
            return Ok(None);
        };
        let framework = match self.scan {
            MarkerScan::Text => {
                let lower = content.to_lowercase();
                self.frameworks
                    .iter()
                    .find(|f| f.markers.iter().any(|m| lower.contains(m)))
            }
            MarkerScan::PackageJson => {
                let deps = package_json_deps(&content).map_err(|e| DetectError::Parse {
                    path: folder.physical_path().join("package.json"),
                    message: e.to_string(),
                })?;
                self.frameworks
                    .iter()
                    .find(|f| f.markers.iter().any(|m| deps.contains(*m)))
            }
        };
        Ok(Some(Inspection {
            framework: framework.map(|f| f.name),
            category: framework.map(|f| f.category).unwrap_or(self.default_category),
        }))
    }

    /// Text of the first manifest file found. Suffix manifests are concatenated.
    fn manifest_text(&self, folder: &FolderEntry) -> Result<Option<String>, DetectError> {
        for manifest in self.manifests {
            match manifest {
                File(name) => {
                    if let Some(text) = folder.read_to_string(name)? {
                        return Ok(Some(text));
                    }
                }
                Suffix(suffix) => {
                    let entries = suffix_entries(folder, suffix);
                    if entries.is_empty() {
                        continue;
                    }
                    let mut text = String::new();
                    for name in entries {
                        if !folder.physical_path().join(&name).is_file() {
                            continue;
                        }
                        if let Some(part) = folder.read_to_string(&name)? {
                            text.push_str(&part);
                            text.push('\n');
                        }
                    }
                    return Ok(Some(text));
                }
            }
        }
        Ok(None)
    }
}

fn suffix_entries(folder: &FolderEntry, suffix: &str) -> Vec<String> {
    let Ok(dir) = fs::read_dir(folder.physical_path()) else {
        return Vec::new();
    };
    let mut names: Vec<String> = dir
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(suffix))
        .collect();
    names.sort();
    names
}

fn package_json_deps(content: &str) -> Result<HashSet<String>, serde_json::Error> {
    let json: serde_json::Value = serde_json::from_str(content)?;
    let mut deps = HashSet::new();
    for key in ["dependencies", "devDependencies", "peerDependencies"] {
        if let Some(obj) = json.get(key).and_then(|v| v.as_object()) {
            deps.extend(obj.keys().cloned());
        }
    }
    Ok(deps)
}
