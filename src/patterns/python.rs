/// Built-in Python signatures.
pub const DOCUMENT: &str = r##"
[SQL_INJECTION]
description: Queries assembled with string formatting
patterns:
- \.execute\s*\(\s*f["']
- \.execute\s*\(\s*.*%\s*
- \.execute\s*\(\s*.*\.format\s*\(
- \.execute\s*\(\s*.*\+

[COMMAND_INJECTION]
description: Shell execution with interpolated input
patterns:
- os\.system\s*\(
- os\.popen\s*\(
- subprocess\.(call|run|Popen|check_output)\s*\(.*shell\s*=\s*True

[REMOTE_CODE_EXECUTION]
description: Dynamic evaluation of code
patterns:
- \beval\s*\(
- \bexec\s*\(

[INSECURE_DESERIALIZATION]
description: Unsafe object loading
patterns:
- pickle\.loads?\s*\(
- yaml\.load\s*\(
- marshal\.loads?\s*\(

[PATH_TRAVERSAL]
description: File opened from request data
patterns:
- open\s*\(\s*.*request\.
"##;
