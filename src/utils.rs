use lfs::Mode;

/// 把路径拆成各级名字，忽略空段和 `.`
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect()
}

/// 拆出父目录路径和最后一级名字：`a/b/c` → (`a/b`, `c`)，`/c` → (`/`, `c`)
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let (dir, name) = match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(pos) => (&trimmed[..pos], &trimmed[pos + 1..]),
        None => ("", trimmed),
    };
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some((dir, name))
    }
}

/// 类似 `ls -l` 的 `drwxr-xr-x`
pub fn format_mode(mode: Mode) -> String {
    let kind = match mode.file_type() {
        Some(lfs::InodeType::Directory) => 'd',
        Some(lfs::InodeType::File) => '-',
        None => '?',
    };
    let perm = mode.permissions();
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (perm >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
