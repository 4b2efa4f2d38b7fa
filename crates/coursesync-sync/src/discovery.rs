//! Discovery units
//!
//! Each unit fetches one slice of the catalog, places the children it finds
//! into the live tree and spawns one further unit per child container:
//!
//! ```text
//! semesters ──► courses(semester) ──► folder(course, top) ──► folder(course, sub) ...
//! ```
//!
//! Units check the run's stop flag before and after their fetch. A vanished
//! entity prunes its node; any other failure is handed to the run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use coursesync_core::domain::{CourseNode, SemesterNode};
use tracing::{debug, warn};

use crate::run::RunContext;
use crate::tree::{LiveCourse, LiveFolder, LiveSemester, LiveSnapshot};

/// What to prune when a folder listing reports the folder gone
pub(crate) enum Missing {
    /// The course's top folder vanished: drop the course
    Course(Arc<LiveSemester>, String),
    /// A subfolder vanished: forget it in its parent
    Folder(Arc<LiveFolder>, String),
}

/// One folder listing to fetch and place
pub(crate) struct FolderJob {
    pub course_id: String,
    /// `None` lists the course's top folder
    pub folder_id: Option<String>,
    /// Scope the listed children are placed into
    pub target: Arc<LiveFolder>,
    pub on_missing: Missing,
    /// Progress label, the course title
    pub label: Arc<str>,
}

impl FolderJob {
    /// Listing of a course's top folder into `course`'s current root
    pub fn top(semester: &Arc<LiveSemester>, course: &LiveCourse) -> Self {
        Self {
            course_id: course.id().to_string(),
            folder_id: None,
            target: course.root(),
            on_missing: Missing::Course(Arc::clone(semester), course.id().to_string()),
            label: course.title().into(),
        }
    }
}

pub(crate) async fn discover_semesters(run: Arc<RunContext>, tree: Arc<LiveSnapshot>) {
    if run.is_stopped() {
        return;
    }
    let result = run.catalog().list_semesters().await;
    if run.is_stopped() {
        return;
    }

    match result {
        Ok(semesters) => {
            debug!(count = semesters.len(), "Discovered semesters");
            for remote in semesters {
                let node = SemesterNode::new(remote.id, remote.title, remote.begin, remote.end);
                if let Some(semester) = tree.push_semester(node) {
                    run.spawn(discover_courses(Arc::clone(&run), semester));
                }
            }
        }
        Err(e) if e.is_recoverable() => {
            warn!(error = %e, "Semester list unavailable");
        }
        Err(e) => run.abort_on(e, "list_semesters"),
    }
    run.report("Semesters");
}

pub(crate) async fn discover_courses(run: Arc<RunContext>, semester: Arc<LiveSemester>) {
    if run.is_stopped() {
        return;
    }
    let result = run.catalog().list_courses(semester.id()).await;
    if run.is_stopped() {
        return;
    }

    match result {
        Ok(courses) => {
            debug!(semester_id = semester.id(), count = courses.len(), "Discovered courses");
            for remote in courses {
                let mut node = CourseNode::new(remote.id, remote.title, remote.type_code);
                node.start = remote.start;
                node.duration = remote.duration;
                node.last_update = run.started_at();

                let course = LiveCourse::new(node);
                semester.push_course(Arc::clone(&course));
                run.count_item();
                run.spawn(folder_unit(
                    Arc::clone(&run),
                    FolderJob::top(&semester, &course),
                ));
            }
        }
        Err(e) if e.is_recoverable() => {
            warn!(semester_id = semester.id(), error = %e, "Courses of semester unavailable");
        }
        Err(e) => run.abort_on(e, "list_courses"),
    }
    run.report(semester.title());
}

/// Boxed folder unit; folder listings spawn further folder listings
pub(crate) fn folder_unit(
    run: Arc<RunContext>,
    job: FolderJob,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(discover_folder(run, job))
}

async fn discover_folder(run: Arc<RunContext>, job: FolderJob) {
    if run.is_stopped() {
        return;
    }
    let result = run
        .catalog()
        .list_folder_contents(&job.course_id, job.folder_id.as_deref())
        .await;
    if run.is_stopped() {
        return;
    }

    match result {
        Ok(contents) => {
            debug!(
                course_id = %job.course_id,
                folder_id = ?job.folder_id,
                folders = contents.folders.len(),
                documents = contents.documents.len(),
                "Listed folder"
            );
            // Place every child before spawning, so names within one
            // listing resolve the same way on every run.
            let children: Vec<FolderJob> = contents
                .folders
                .iter()
                .map(|remote| FolderJob {
                    course_id: job.course_id.clone(),
                    folder_id: Some(remote.id.clone()),
                    target: job.target.place_folder(remote, run.default_folder()),
                    on_missing: Missing::Folder(Arc::clone(&job.target), remote.id.clone()),
                    label: Arc::clone(&job.label),
                })
                .collect();
            for remote in &contents.documents {
                if !remote.folder_id.is_empty() {
                    job.target.adopt_alias(&remote.folder_id);
                }
                job.target.place_document(remote);
            }
            for child in children {
                run.spawn(folder_unit(Arc::clone(&run), child));
            }
        }
        Err(e) if e.is_recoverable() => {
            match &job.on_missing {
                Missing::Course(semester, course_id) => {
                    warn!(course_id = %course_id, error = %e, "Course vanished, pruning");
                    semester.remove_course(course_id);
                }
                Missing::Folder(parent, folder_id) => {
                    warn!(folder_id = %folder_id, error = %e, "Folder vanished, pruning");
                    parent.forget_folder(folder_id);
                }
            }
            run.mark_dirty();
        }
        Err(e) => run.abort_on(e, "list_folder_contents"),
    }
    run.report(&job.label);
}
