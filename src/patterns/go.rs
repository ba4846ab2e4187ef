/// Built-in Go signatures.
pub const DOCUMENT: &str = r##"
[COMMAND_INJECTION]
description: os/exec Command construction
patterns:
- exec\.Command\s*\(
- exec\.CommandContext\s*\(

[SQL_INJECTION]
description: Queries built with fmt.Sprintf or concatenation
patterns:
- \.(Query|QueryRow|Exec)\s*\(\s*fmt\.Sprintf
- \.(Query|QueryRow|Exec)\s*\(\s*".*"\s*\+

[SENSITIVE_DATA_EXPOSURE]
description: TLS verification disabled or weak hashing
patterns:
- InsecureSkipVerify\s*:\s*true
- md5\.New\s*\(
- sha1\.New\s*\(

[PATH_TRAVERSAL]
description: File access from request values
patterns:
- os\.(Open|ReadFile)\s*\(\s*.*r\.(URL|FormValue)
"##;
